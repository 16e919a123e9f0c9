//! rostro-capture — Image acquisition for the comparison workflow.
//!
//! Gates each acquisition on a device permission, invokes a picker with a
//! fixed square / JPEG-quality policy, and hands the resulting image to the
//! submission controller.

pub mod coordinator;
pub mod picker;
pub mod policy;
pub mod workflow;

pub use coordinator::{
    Acquisition, CaptureCoordinator, CaptureError, ImagePicker, Permission, PermissionGate,
    PickResult, Source,
};
pub use picker::{FilePicker, StaticPermissions};
pub use policy::{CapturePolicy, CAPTURE_POLICY};
pub use workflow::{capture_and_submit, Identify, WorkflowError};
