//! Data models for courseharvest.

mod course;
mod institution;
mod job;
mod operation;
mod target;

pub use course::{Course, CourseFormat, CourseLevel, FeesType, RawCourse, ValidatedCourse};
pub use institution::{Institution, RawInstitution, ValidatedInstitution};
pub use job::JobStatus;
pub use operation::{
    MemoryUsage, OperationDetails, OperationRecord, OperationStatus, ProgressUpdate,
};
pub use target::{builtin_targets, RenderMode, SelectorMap, TargetConfig};
