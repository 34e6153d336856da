//! Dedicated engine thread owning the loaded models.
//!
//! The detector model and the chosen representation variant are loaded
//! once and owned by a single OS thread; callers reach it through a
//! bounded channel, which caps concurrent heavy extraction work. No
//! request is cancellable mid-flight; callers enforce deadlines at the
//! boundary.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;
use crate::error::VerifyFailure;
use crate::frame::ImageSource;
use crate::locator::LocatorError;
use crate::types::VerificationRecord;
use crate::verifier::{Verifier, VerifyRequest};

const REQUEST_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Setup(#[from] LocatorError),
    #[error(transparent)]
    Verify(#[from] VerifyFailure),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from callers to the engine thread.
enum EngineRequest {
    Verify {
        camera: ImageSource,
        document: ImageSource,
        request: VerifyRequest,
        reply: oneshot::Sender<Result<VerificationRecord, VerifyFailure>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run one verification on the engine thread.
    pub async fn verify(
        &self,
        camera: ImageSource,
        document: ImageSource,
        request: VerifyRequest,
    ) -> Result<VerificationRecord, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Verify {
                camera,
                document,
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        let outcome = reply_rx.await.map_err(|_| EngineError::ChannelClosed)?;
        Ok(outcome?)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads the cascade model and resolves the representation variant
/// before returning, so startup fails fast when the cascade model is
/// missing.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    Ok(spawn_with(Verifier::new(config)?))
}

/// Spawn the engine around a preassembled verifier.
pub fn spawn_with(mut verifier: Verifier) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_QUEUE_DEPTH);

    std::thread::Builder::new()
        .name("veriface-engine".into())
        .spawn(move || {
            tracing::info!(method = verifier.method().as_str(), "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Verify {
                        camera,
                        document,
                        request,
                        reply,
                    } => {
                        let result = verifier.verify(&camera, &document, &request);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::HeuristicExtractor;
    use crate::frame::Frame;
    use crate::locator::Locate;
    use crate::types::FaceRegion;
    use std::io::Cursor;

    /// Locator stub that reports one centred face in every frame.
    struct CenteredFace;

    impl Locate for CenteredFace {
        fn locate(&mut self, frame: &Frame) -> Vec<FaceRegion> {
            vec![FaceRegion {
                x: frame.width / 4,
                y: frame.height / 4,
                width: frame.width / 2,
                height: frame.height / 2,
            }]
        }
    }

    fn good_image() -> ImageSource {
        let width = 120u32;
        let height = 120u32;
        let data: Vec<u8> = (0..height)
            .flat_map(|y| (0..width).map(move |x| if (x + y) % 2 == 0 { 0u8 } else { 255u8 }))
            .collect();
        let frame = Frame {
            data,
            width,
            height,
        };
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(frame.to_gray_image())
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        ImageSource::Bytes(buf.into_inner())
    }

    fn stub_engine() -> EngineHandle {
        let verifier = Verifier::from_parts(
            Box::new(CenteredFace),
            Box::new(HeuristicExtractor),
            &Config::default(),
        );
        spawn_with(verifier)
    }

    #[tokio::test]
    async fn test_engine_round_trip() {
        let handle = stub_engine();
        let record = handle
            .verify(good_image(), good_image(), VerifyRequest::default())
            .await
            .unwrap();
        assert!(record.is_match);
        assert!((record.confidence - 100.0).abs() < 1e-2);
    }

    #[tokio::test]
    async fn test_engine_surfaces_verify_failure() {
        let handle = stub_engine();
        let err = handle
            .verify(
                ImageSource::Bytes(vec![0, 1, 2]),
                good_image(),
                VerifyRequest::default(),
            )
            .await
            .unwrap_err();
        match err {
            EngineError::Verify(failure) => {
                assert_eq!(failure.error_kind(), "CAMERA_IMAGE_IMAGE_READ_ERROR");
            }
            other => panic!("expected verify failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_engine_handles_sequential_callers() {
        let handle = stub_engine();
        for _ in 0..3 {
            let cloned = handle.clone();
            let record = cloned
                .verify(good_image(), good_image(), VerifyRequest::default())
                .await
                .unwrap();
            assert!(record.is_match);
        }
    }

    #[tokio::test]
    async fn test_spawn_engine_fails_without_cascade_model() {
        let config = Config {
            model_dir: std::path::PathBuf::from("/nonexistent/models"),
            ..Config::default()
        };
        assert!(matches!(
            spawn_engine(&config),
            Err(EngineError::Setup(LocatorError::ModelNotFound(_)))
        ));
    }
}
