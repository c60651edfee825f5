use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use bevy::app::{App, AppExit, ScheduleRunnerPlugin, Update};
use bevy::ecs::prelude::*;

use pose3d_scene::config::Config;
use pose3d_scene::logging;
use pose3d_scene::pose::{
    spawn_detection_worker, DetectionOutcome, DetectionRequest, ObservationHolder, SidecarDetector,
};
use pose3d_scene::render::SceneWindow;
use pose3d_scene::scene::{load_source_image, CameraMode, ImageSource, SceneComposer};

const CONFIG_PATH: &str = "config.toml";

// --- Bevy Resources ---

#[derive(Resource)]
struct DetectionTx(mpsc::SyncSender<DetectionRequest>);

#[derive(Resource)]
struct DetectionRx(Mutex<mpsc::Receiver<DetectionOutcome>>);

#[derive(Resource)]
struct Holder(ObservationHolder);

#[derive(Resource)]
struct ViewState {
    composer: SceneComposer,
    image_path: PathBuf,
    image: ImageSource,
    /// 最後に構築した (世代, 表示モード)
    built: Option<(u64, CameraMode)>,
    toggle_flag: Arc<AtomicBool>,
    reload_flag: Arc<AtomicBool>,
}

#[derive(Resource)]
struct FpsCounter {
    frame_count: u32,
    rebuild_count: u32,
    timer: Instant,
}

fn main() -> Result<()> {
    let log_path = logging::init("viewer", log::LevelFilter::Info)?;
    let config = Config::load_or_default(CONFIG_PATH);

    log::info!("Skeleton viewer ({})", env!("GIT_VERSION"));
    log::info!("Log file: {}", log_path.display());

    let image_path = match std::env::args().nth(1).or_else(|| config.detection.image_path.clone()) {
        Some(p) => PathBuf::from(p),
        None => bail!("Usage: skeleton_viewer <image> (or set [detection] image_path in {})", CONFIG_PATH),
    };
    log::info!("Image: {}", image_path.display());
    log::info!("Camera mode: {}", config.render.camera_mode);

    // 画像が読めなくてもテクスチャなしの平面で続行
    let image = ImageSource::from_load(load_source_image(&image_path));
    if let Some(img) = image.image() {
        log::info!("Image size: {}x{}", img.width, img.height);
    }

    // 検出スレッド
    let detector = SidecarDetector::new(&config.detection.sidecar_suffix);
    let (request_tx, result_rx, _worker) = spawn_detection_worker(detector, 1);
    request_tx
        .send(DetectionRequest::new(image_path.clone()))
        .context("Detection thread is not running")?;

    // 表示切替: SIGUSR1 またはコンソール入力 "c"（"r" で再検出）
    let toggle_flag = Arc::new(AtomicBool::new(false));
    let reload_flag = Arc::new(AtomicBool::new(false));
    {
        signal_hook::flag::register(signal_hook::consts::SIGUSR1, toggle_flag.clone())
            .context("Failed to register SIGUSR1 handler")?;
        let toggle = toggle_flag.clone();
        let reload = reload_flag.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let cmd = line.trim();
                        if cmd.eq_ignore_ascii_case("c") {
                            toggle.store(true, Ordering::Release);
                        } else if cmd.eq_ignore_ascii_case("r") {
                            reload.store(true, Ordering::Release);
                        }
                    }
                }
            }
        });
    }

    let window = SceneWindow::new("skeleton_viewer", &config.viewer)?;
    log::info!("Window: {}x{}", config.viewer.width, config.viewer.height);
    log::info!("");
    log::info!("操作: [C] 表示切替  [R] 再検出  [←→↑↓] 回転  [+/-] 拡大縮小  [Esc] 終了");
    log::info!("");

    let frame_duration = Duration::from_secs_f64(1.0 / config.viewer.target_fps.max(1) as f64);

    let mut app = App::new();
    app.add_plugins(ScheduleRunnerPlugin::run_loop(frame_duration))
        .insert_resource(DetectionTx(request_tx))
        .insert_resource(DetectionRx(Mutex::new(result_rx)))
        .insert_resource(Holder(ObservationHolder::new()))
        .insert_resource(ViewState {
            composer: SceneComposer::new(config.render.clone()),
            image_path,
            image,
            built: None,
            toggle_flag,
            reload_flag,
        })
        .insert_resource(FpsCounter {
            frame_count: 0,
            rebuild_count: 0,
            timer: Instant::now(),
        })
        .insert_non_send_resource(window)
        .add_systems(Update, (
            input_system,
            request_detection_system,
            receive_detection_system,
            rebuild_system,
            draw_system,
            fps_system,
        ).chain());

    app.run();

    log::info!("Shutting down...");
    log::logger().flush();
    Ok(())
}

// --- Systems ---

fn input_system(mut view: ResMut<ViewState>, mut window: NonSendMut<SceneWindow>) {
    window.handle_orbit_keys();
    if window.toggle_requested() {
        view.toggle_flag.store(true, Ordering::Release);
    }
    if window.reload_requested() {
        view.reload_flag.store(true, Ordering::Release);
    }
    if view.toggle_flag.swap(false, Ordering::AcqRel) {
        let mode = view.composer.toggle_mode();
        log::info!("Camera mode: {}", mode);
    }
}

fn request_detection_system(view: Res<ViewState>, tx: Res<DetectionTx>) {
    if !view.reload_flag.swap(false, Ordering::AcqRel) {
        return;
    }
    match tx.0.try_send(DetectionRequest::new(view.image_path.clone())) {
        Ok(()) => log::info!("Re-detecting {}", view.image_path.display()),
        Err(mpsc::TrySendError::Full(_)) => log::info!("Detection already queued"),
        Err(mpsc::TrySendError::Disconnected(_)) => log::warn!("Detection thread has stopped"),
    }
}

fn receive_detection_system(rx: Res<DetectionRx>, holder: Res<Holder>) {
    let rx = match rx.0.lock() {
        Ok(rx) => rx,
        Err(_) => return,
    };
    while let Ok(outcome) = rx.try_recv() {
        // 失敗時は直前の観測を維持
        match holder.0.apply(outcome) {
            Ok(generation) => log::debug!("Observation generation {}", generation),
            Err(e) => log::warn!("Keeping previous observation: {}", e),
        }
    }
}

fn rebuild_system(
    mut view: ResMut<ViewState>,
    holder: Res<Holder>,
    mut fps: ResMut<FpsCounter>,
    mut window: NonSendMut<SceneWindow>,
) {
    let (generation, observation) = holder.0.snapshot();
    let key = (generation, view.composer.mode());
    if view.built == Some(key) {
        return;
    }
    let composed = view.composer.render(observation.as_deref(), &view.image, &mut *window);
    if observation.is_some() {
        log::info!(
            "Scene rebuilt: {} joints, {} bones, scale {:.3}",
            composed.scene.joint_marker_count(),
            composed.scene.bone_count(),
            composed.scale
        );
    }
    view.built = Some(key);
    fps.rebuild_count += 1;
}

fn draw_system(mut window: NonSendMut<SceneWindow>, mut exit: EventWriter<AppExit>) {
    if !window.is_open() {
        exit.send(AppExit::Success);
        return;
    }
    window.draw();
    if let Err(e) = window.update() {
        log::warn!("Window update failed: {}", e);
        exit.send(AppExit::Success);
    }
}

fn fps_system(mut fps: ResMut<FpsCounter>) {
    fps.frame_count += 1;
    let elapsed = fps.timer.elapsed().as_secs_f32();
    if elapsed >= 10.0 {
        log::debug!(
            "FPS: {:.1} (rebuilds: {})",
            fps.frame_count as f32 / elapsed,
            fps.rebuild_count
        );
        fps.frame_count = 0;
        fps.rebuild_count = 0;
        fps.timer = Instant::now();
    }
}
