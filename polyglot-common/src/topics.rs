//! Message bus topic names
//!
//! One topic per stage hand-off. Every message on every topic is keyed by
//! task id, so messages for one task are totally ordered within a topic.
//! There is no ordering guarantee across topics.

/// Task creation topic - published by the task service, consumed by the
/// speech recognition stage.
pub const TASK_CREATED: &str = "task.created";

/// Speech recognition completion topic - published by the speech stage,
/// consumed by the translation stage.
pub const SPEECH_RECOGNITION_COMPLETED: &str = "speech.recognition.completed";

/// Translation completion topic - published by the translation stage,
/// consumed by the encoding stage.
pub const TRANSLATION_COMPLETED: &str = "translation.completed";

/// Encoding completion topic - published by the encoding stage, consumed by
/// the task service to finalize task status.
pub const ENCODING_COMPLETED: &str = "encoding.completed";

/// Task failure topic - any stage may publish here; consumed by the task
/// service failure handler.
pub const TASK_FAILED: &str = "task.failed";
