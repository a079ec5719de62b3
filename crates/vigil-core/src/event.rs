//! Alarm event model.
//!
//! One [`AlarmEvent`] is produced per well-formed `Code=` line on a camera's
//! attach stream. Events are ephemeral: created by the parser, consumed by
//! the filter and dispatcher, then dropped. Nothing retains event history.

use std::collections::BTreeMap;

use crate::error::Result;

/// One decoded alarm record from a camera's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEvent {
    /// Name of the camera that emitted the event.
    pub camera: String,

    /// Event code, verbatim from the wire (e.g. `VideoMotion`).
    pub code: String,

    /// Event action, verbatim from the wire (e.g. `Start`, `Stop`, `Pulse`).
    pub action: String,

    /// Every `key=value` pair from the line, keys lower-cased, values
    /// verbatim. Includes `code` and `action` plus any vendor extras
    /// (`index`, `data`, ...). BTreeMap keeps serialization order stable.
    pub fields: BTreeMap<String, String>,
}

impl AlarmEvent {
    /// Serialize the full field map as a JSON object.
    ///
    /// This is the payload published on the camera's bare topic.
    pub fn payload_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

/// Event codes the devices document for the attach interface.
///
/// The attach request takes any subset of these (or [`codes::ALL`]); the
/// whitelist in camera config is matched against the `Code=` value exactly.
pub mod codes {
    /// Wildcard accepted by the attach URL: subscribe to every event type.
    pub const ALL: &str = "All";

    /// Motion detected in the frame.
    pub const VIDEO_MOTION: &str = "VideoMotion";
    /// Video signal lost.
    pub const VIDEO_LOSS: &str = "VideoLoss";
    /// Lens covered or scene blacked out.
    pub const VIDEO_BLIND: &str = "VideoBlind";
    /// Wired alarm input triggered.
    pub const ALARM_LOCAL: &str = "AlarmLocal";
    /// Tripwire crossed (IVS).
    pub const CROSS_LINE: &str = "CrossLineDetection";
    /// Intrusion into a configured region (IVS).
    pub const CROSS_REGION: &str = "CrossRegionDetection";
    /// Object left behind in a region (IVS).
    pub const LEFT_DETECTION: &str = "LeftDetection";
    /// Object removed from a region (IVS).
    pub const TAKEN_AWAY: &str = "TakenAwayDetection";
    /// Scene change / camera moved.
    pub const VIDEO_ABNORMAL: &str = "VideoAbnormalDetection";
    /// Face detected.
    pub const FACE_DETECTION: &str = "FaceDetection";
    /// Sudden change in audio level.
    pub const AUDIO_MUTATION: &str = "AudioMutation";
    /// Audio anomaly (NVR-side analytics).
    pub const AUDIO_ANOMALY: &str = "AudioAnomaly";
    /// Image out of focus.
    pub const VIDEO_UNFOCUS: &str = "VideoUnFocus";
    /// Loitering in a region (IVS).
    pub const WANDER_DETECTION: &str = "WanderDetection";
    /// Crowd gathering (IVS).
    pub const RIOTER_DETECTION: &str = "RioterDetection";
    /// Illegal parking (IVS).
    pub const PARKING_DETECTION: &str = "ParkingDetection";
    /// Moving target in a region (IVS).
    pub const MOVE_DETECTION: &str = "MoveDetection";
    /// Per-window motion detail records emitted alongside VideoMotion.
    pub const MD_RESULT: &str = "MDResult";
}
