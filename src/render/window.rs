use anyhow::Result;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::config::ViewerConfig;
use crate::render::projection::{joint_centers, plane_point, wireframe, OrbitCamera};
use crate::scene::{Geometry, NodeRole, RenderSurface, Scene};

/// 背景色 (RGB)
pub const BACKGROUND_COLOR: u32 = 0xBDBDC2;

/// 関節マーカーの半径（ピクセル）
const JOINT_RADIUS: i32 = 3;

/// minifbを使用したシーンビュー
pub struct SceneWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    camera: OrbitCamera,
    scene: Option<Scene>,
}

impl SceneWindow {
    /// ウィンドウを作成
    pub fn new(title: &str, config: &ViewerConfig) -> Result<Self> {
        let width = config.width;
        let height = config.height;
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;
        window.set_target_fps(config.target_fps.max(1) as usize);

        Ok(Self {
            window,
            buffer: vec![BACKGROUND_COLOR; width * height],
            width,
            height,
            camera: OrbitCamera::from_config(config),
            scene: None,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    /// Cキーが押されたか（表示モード切替）
    pub fn toggle_requested(&self) -> bool {
        self.window.is_key_pressed(Key::C, KeyRepeat::No)
    }

    /// Rキーが押されたか（再検出）
    pub fn reload_requested(&self) -> bool {
        self.window.is_key_pressed(Key::R, KeyRepeat::No)
    }

    /// 矢印キーで回転、+/-で拡大縮小
    pub fn handle_orbit_keys(&mut self) {
        let step = 0.05;
        if self.window.is_key_down(Key::Left) {
            self.camera.orbit(-step, 0.0);
        }
        if self.window.is_key_down(Key::Right) {
            self.camera.orbit(step, 0.0);
        }
        if self.window.is_key_down(Key::Up) {
            self.camera.orbit(0.0, step);
        }
        if self.window.is_key_down(Key::Down) {
            self.camera.orbit(0.0, -step);
        }
        if self.window.is_key_down(Key::Equal) || self.window.is_key_down(Key::NumPadPlus) {
            self.camera.zoom(1.02);
        }
        if self.window.is_key_down(Key::Minus) || self.window.is_key_down(Key::NumPadMinus) {
            self.camera.zoom(1.0 / 1.02);
        }
    }

    /// 現在のシーンをバッファに描画
    pub fn draw(&mut self) {
        self.buffer.fill(BACKGROUND_COLOR);
        let scene = match self.scene.take() {
            Some(scene) => scene,
            None => return,
        };

        self.draw_textures(&scene);

        for segment in wireframe(&scene) {
            let start = self.camera.project(&segment.start, self.width, self.height);
            let end = self.camera.project(&segment.end, self.width, self.height);
            if let (Some((x1, y1, _)), Some((x2, y2, _))) = (start, end) {
                self.draw_line(x1 as i32, y1 as i32, x2 as i32, y2 as i32, segment.color, segment.opacity);
            }
        }

        for (center, color) in joint_centers(&scene) {
            if let Some((x, y, _)) = self.camera.project(&center, self.width, self.height) {
                self.draw_circle(x as i32, y as i32, JOINT_RADIUS, color);
            }
        }

        self.scene = Some(scene);
    }

    /// テクスチャ付き平面を点で塗る
    fn draw_textures(&mut self, scene: &Scene) {
        let mut planes = Vec::new();
        scene.visit(|node, world| {
            if node.hidden || node.role != NodeRole::ImagePlane {
                return;
            }
            if let (Some(Geometry::Plane { width, height }), Some(texture)) =
                (node.geometry, node.material.texture.clone())
            {
                planes.push((*world, width, height, texture, node.opacity));
            }
        });

        for (world, width, height, texture, opacity) in planes {
            // 画面上でおおよそ1ピクセル間隔になるよう分割
            let steps_u = ((width * self.camera.scale).ceil() as usize).clamp(1, 4096);
            let steps_v = ((height * self.camera.scale).ceil() as usize).clamp(1, 4096);
            for iv in 0..steps_v {
                let v = (iv as f32 + 0.5) / steps_v as f32;
                for iu in 0..steps_u {
                    let u = (iu as f32 + 0.5) / steps_u as f32;
                    let p = plane_point(&world, width, height, u, v);
                    if let Some((x, y, _)) = self.camera.project(&p, self.width, self.height) {
                        self.blend_pixel(x as i32, y as i32, texture.sample(u, v), opacity);
                    }
                }
            }
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    /// Bresenhamのアルゴリズムで線を描画
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u32, opacity: f32) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        let mut x = x0;
        let mut y = y0;

        loop {
            self.blend_pixel(x, y, color, opacity);

            if x == x1 && y == y1 {
                break;
            }

            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.blend_pixel(cx + dx, cy + dy, color, 1.0);
                }
            }
        }
    }

    /// 不透明度付きでピクセルを合成（境界チェック付き）
    fn blend_pixel(&mut self, x: i32, y: i32, color: u32, opacity: f32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            let idx = y as usize * self.width + x as usize;
            self.buffer[idx] = blend(self.buffer[idx], color, opacity);
        }
    }
}

impl RenderSurface for SceneWindow {
    fn set_scene(&mut self, scene: Scene) {
        self.scene = Some(scene);
    }
}

/// dst に src を alpha で重ねる (0x00RRGGBB)
pub fn blend(dst: u32, src: u32, alpha: f32) -> u32 {
    let a = alpha.clamp(0.0, 1.0);
    let channel = |shift: u32| {
        let d = ((dst >> shift) & 0xFF) as f32;
        let s = ((src >> shift) & 0xFF) as f32;
        ((s * a + d * (1.0 - a)).round() as u32).min(255) << shift
    };
    channel(16) | channel(8) | channel(0)
}
