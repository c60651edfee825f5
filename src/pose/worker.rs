use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::DetectionError;
use super::detector::BodyPoseDetector;
use super::observation::Observation;

/// 検出スレッドへの要求
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub image_path: PathBuf,
    pub timestamp: Instant,
}

impl DetectionRequest {
    pub fn new(image_path: PathBuf) -> Self {
        Self { image_path, timestamp: Instant::now() }
    }
}

/// 検出スレッドからの結果
#[derive(Debug)]
pub struct DetectionOutcome {
    pub image_path: PathBuf,
    pub timestamp: Instant,
    pub result: Result<Observation, DetectionError>,
}

/// 最新の観測を保持する（last-write-wins）
///
/// 成功した検出だけが観測を置き換える。失敗時は直前の観測を残す。
/// 世代番号は観測が置き換わるたびに増える。
#[derive(Clone, Default)]
pub struct ObservationHolder {
    inner: Arc<Mutex<HolderState>>,
}

#[derive(Default)]
struct HolderState {
    generation: u64,
    latest_timestamp: Option<Instant>,
    observation: Option<Arc<Observation>>,
}

impl ObservationHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 観測を置き換える。戻り値は新しい世代番号
    pub fn publish(&self, observation: Observation) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.latest_timestamp = Some(Instant::now());
        state.observation = Some(Arc::new(observation));
        state.generation
    }

    /// 検出結果を反映する
    ///
    /// 要求時刻が現在の観測より古い結果は捨てる。
    /// 失敗は診断用にそのまま返し、観測は変更しない。
    pub fn apply(&self, outcome: DetectionOutcome) -> Result<u64, DetectionError> {
        let observation = outcome.result?;
        let mut state = self.lock();
        if let Some(latest) = state.latest_timestamp {
            if outcome.timestamp < latest {
                return Ok(state.generation);
            }
        }
        state.generation += 1;
        state.latest_timestamp = Some(outcome.timestamp);
        state.observation = Some(Arc::new(observation));
        Ok(state.generation)
    }

    /// 現在の世代と観測のスナップショット
    pub fn snapshot(&self) -> (u64, Option<Arc<Observation>>) {
        let state = self.lock();
        (state.generation, state.observation.clone())
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HolderState> {
        // 保持しているのは不変データのみなので、poisonしても中身は使える
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 検出スレッドを起動する
///
/// 要求キューに溜まった要求はドレインして最新のみ処理する。
/// 要求側が切断されるとスレッドは終了する。
pub fn spawn_detection_worker<D>(
    mut detector: D,
    capacity: usize,
) -> (mpsc::SyncSender<DetectionRequest>, mpsc::Receiver<DetectionOutcome>, JoinHandle<()>)
where
    D: BodyPoseDetector + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::sync_channel::<DetectionRequest>(capacity.max(1));
    let (result_tx, result_rx) = mpsc::channel::<DetectionOutcome>();

    let handle = thread::spawn(move || {
        while let Ok(req) = request_rx.recv() {
            let mut latest = req;
            while let Ok(queued) = request_rx.try_recv() {
                log::debug!("Superseded detection request: {}", latest.image_path.display());
                latest = queued;
            }

            let result = detector.detect(&latest.image_path);
            match &result {
                Ok(obs) => log::info!(
                    "Detected {} joints in {}",
                    obs.available_joint_names().len(),
                    latest.image_path.display()
                ),
                Err(e) => log::warn!("Detection failed for {}: {}", latest.image_path.display(), e),
            }

            let outcome = DetectionOutcome {
                image_path: latest.image_path,
                timestamp: latest.timestamp,
                result,
            };
            if result_tx.send(outcome).is_err() {
                break;
            }
        }
    });

    (request_tx, result_rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{JointName, RecognizedPoint};
    use nalgebra::{Matrix4, Vector2, Vector3};
    use std::path::Path;
    use std::time::Duration;

    fn observation_with(joints: &[JointName]) -> Observation {
        let mut builder = Observation::builder(Matrix4::identity());
        for joint in joints {
            builder = builder.joint(
                *joint,
                RecognizedPoint::from_translations(Vector3::zeros(), Vector3::zeros()),
                Vector2::new(0.5, 0.5),
            );
        }
        builder.build()
    }

    /// パスに "fail" を含むと失敗する検出器
    struct FakeDetector;

    impl BodyPoseDetector for FakeDetector {
        fn detect(&mut self, image_path: &Path) -> Result<Observation, DetectionError> {
            if image_path.to_string_lossy().contains("fail") {
                Err(DetectionError::Engine("fake failure".to_string()))
            } else {
                Ok(observation_with(&[JointName::Root]))
            }
        }
    }

    #[test]
    fn test_holder_starts_empty() {
        let holder = ObservationHolder::new();
        let (generation, obs) = holder.snapshot();
        assert_eq!(generation, 0);
        assert!(obs.is_none());
    }

    #[test]
    fn test_publish_replaces() {
        let holder = ObservationHolder::new();
        holder.publish(observation_with(&[JointName::Root]));
        let generation = holder.publish(observation_with(&[JointName::Root, JointName::Spine]));
        assert_eq!(generation, 2);
        let (_, obs) = holder.snapshot();
        assert_eq!(obs.unwrap().available_joint_names().len(), 2);
    }

    #[test]
    fn test_failure_keeps_previous() {
        let holder = ObservationHolder::new();
        holder.publish(observation_with(&[JointName::Root]));
        let outcome = DetectionOutcome {
            image_path: PathBuf::from("x.jpg"),
            timestamp: Instant::now(),
            result: Err(DetectionError::FileMissing("x.jpg".to_string())),
        };
        assert!(holder.apply(outcome).is_err());
        let (generation, obs) = holder.snapshot();
        assert_eq!(generation, 1);
        assert!(obs.is_some());
    }

    #[test]
    fn test_stale_outcome_ignored() {
        let holder = ObservationHolder::new();
        let old_request = Instant::now();
        std::thread::sleep(Duration::from_millis(2));
        holder.publish(observation_with(&[JointName::Root, JointName::Spine]));
        let outcome = DetectionOutcome {
            image_path: PathBuf::from("old.jpg"),
            timestamp: old_request,
            result: Ok(observation_with(&[JointName::Root])),
        };
        assert_eq!(holder.apply(outcome).unwrap(), 1);
        let (_, obs) = holder.snapshot();
        assert_eq!(obs.unwrap().available_joint_names().len(), 2);
    }

    #[test]
    fn test_worker_roundtrip() {
        let (tx, rx, handle) = spawn_detection_worker(FakeDetector, 4);
        tx.send(DetectionRequest::new(PathBuf::from("ok.jpg"))).unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(outcome.result.is_ok());

        tx.send(DetectionRequest::new(PathBuf::from("fail.jpg"))).unwrap();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(outcome.result.is_err());

        drop(tx);
        handle.join().unwrap();
    }
}
