//! Acquisition followed by submission, in sequence.

use rostro_core::{AttemptStatus, Registry, Rejected, SubmissionController};
use thiserror::Error;

use crate::coordinator::{Acquisition, CaptureCoordinator, CaptureError, ImagePicker, PermissionGate, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identify {
    /// The operator backed out; nothing was sent.
    Cancelled,
    Submitted(AttemptStatus),
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// The controller refused the image; it is carried back for disposal.
    #[error(transparent)]
    Submit(#[from] Rejected),
}

/// Acquire one image and, unless cancelled, submit it for comparison.
///
/// Capture failures return before the controller is touched.
pub async fn capture_and_submit<P, G, R>(
    coordinator: &CaptureCoordinator<P, G>,
    controller: &SubmissionController<R>,
    source: Source,
) -> Result<Identify, WorkflowError>
where
    P: ImagePicker,
    G: PermissionGate,
    R: Registry + ?Sized,
{
    match coordinator.acquire(source).await? {
        Acquisition::Cancelled => Ok(Identify::Cancelled),
        Acquisition::Captured(image) => {
            let status = controller.submit(image).await?;
            Ok(Identify::Submitted(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::{FakeGate, FakePicker};
    use crate::coordinator::Permission;
    use async_trait::async_trait;
    use rostro_core::{
        ImageHandle, OperationAck, PersonRecord, PersonUpdate, Phase, RegistryError,
        RegistryResult, SubmitError, Url, Verdict,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Answers every comparison with no match and counts calls.
    #[derive(Default)]
    struct CountingRegistry {
        compares: AtomicUsize,
    }

    #[async_trait]
    impl Registry for CountingRegistry {
        async fn list(&self) -> RegistryResult<Vec<PersonRecord>> {
            Ok(Vec::new())
        }

        async fn read(&self, user_id: &str) -> RegistryResult<PersonRecord> {
            Err(RegistryError::NotFound {
                user_id: user_id.into(),
            })
        }

        fn image_url(&self, user_id: &str) -> Url {
            Url::parse(&format!("http://registry.test/usuario/{user_id}/imagen")).unwrap()
        }

        async fn fetch_image(&self, _: &str) -> RegistryResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn compare(&self, _: &ImageHandle) -> RegistryResult<Verdict> {
            self.compares.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::NoMatch)
        }

        async fn create(&self, _: &PersonRecord, _: &ImageHandle) -> RegistryResult<OperationAck> {
            Ok(OperationAck::default())
        }

        async fn update(
            &self,
            _: &str,
            _: &PersonUpdate,
            _: Option<&ImageHandle>,
        ) -> RegistryResult<OperationAck> {
            Ok(OperationAck::default())
        }

        async fn delete(&self, _: &str) -> RegistryResult<OperationAck> {
            Ok(OperationAck::default())
        }
    }

    fn controller() -> (Arc<CountingRegistry>, SubmissionController<CountingRegistry>) {
        let registry = Arc::new(CountingRegistry::default());
        let controller =
            SubmissionController::new(Arc::clone(&registry)).with_pacing(Duration::ZERO);
        (registry, controller)
    }

    #[tokio::test]
    async fn test_cancelled_acquisition_leaves_controller_idle() {
        let (registry, controller) = controller();
        let coordinator =
            CaptureCoordinator::new(FakePicker::new(None), FakeGate::new(Permission::Granted));
        let phases = controller.subscribe();

        let result = capture_and_submit(&coordinator, &controller, Source::Camera)
            .await
            .unwrap();
        assert_eq!(result, Identify::Cancelled);
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!phases.has_changed().unwrap());
        assert_eq!(registry.compares.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denied_permission_never_submits() {
        let (registry, controller) = controller();
        let coordinator =
            CaptureCoordinator::new(FakePicker::new(Some("a.jpg")), FakeGate::new(Permission::Denied));

        let err = capture_and_submit(&coordinator, &controller, Source::Camera)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Capture(CaptureError::PermissionDenied(Source::Camera))
        ));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(registry.compares.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_captured_image_is_submitted() {
        let (registry, controller) = controller();
        let coordinator =
            CaptureCoordinator::new(FakePicker::new(Some("b.jpg")), FakeGate::new(Permission::Granted));

        let result = capture_and_submit(&coordinator, &controller, Source::Library)
            .await
            .unwrap();
        assert_eq!(result, Identify::Submitted(AttemptStatus::Resolved));
        assert_eq!(controller.phase(), Phase::NoMatchFound);
        assert_eq!(registry.compares.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconsumed_outcome_surfaces_as_submit_error() {
        let (_, controller) = controller();
        let coordinator =
            CaptureCoordinator::new(FakePicker::new(Some("c.jpg")), FakeGate::new(Permission::Granted));

        capture_and_submit(&coordinator, &controller, Source::Library)
            .await
            .unwrap();
        let err = capture_and_submit(&coordinator, &controller, Source::Library)
            .await
            .unwrap_err();
        let WorkflowError::Submit(rejected) = err else {
            panic!("expected submit rejection, got {err:?}");
        };
        assert_eq!(rejected.reason, SubmitError::Unconsumed(Phase::NoMatchFound));
        assert_eq!(rejected.image, ImageHandle::new("c.jpg"));
    }
}
