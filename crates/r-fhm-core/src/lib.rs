//! ---
//! fhm_section: "04-configuration-orchestration"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Pipeline orchestration and streaming lifecycle."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
//! Scoring pipeline, background streaming loop, and alert dispatch for R-FHM.

pub mod alert;
pub mod pipeline;
pub mod stream;
pub mod training;

pub use alert::{AlertDispatch, AlertDispatcher, AlertMessage, AlertSink, LogSink, WebhookSink};
pub use pipeline::{annotate_safety, SampleOrigin, TelemetryPipeline};
pub use stream::{StreamHandle, StreamRunner};
pub use training::{retrain_from_log, TrainingError, TrainingOutcome};
