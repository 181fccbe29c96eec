use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(SessionId);

const CONNECTING_LABEL: &str = "connecting";
const FAILED_LABEL: &str = "failed";

/// One status observation reported by the motion backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatusSnapshot {
    pub mode: String,
    pub run_status: String,
    pub alarm_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_code: Option<i64>,
    #[serde(default)]
    pub gv0_value: Option<f64>,
}

impl RobotStatusSnapshot {
    /// Placeholder shown before the first attempt completes.
    pub fn connecting() -> Self {
        Self::labelled(CONNECTING_LABEL)
    }

    /// Placeholder shown after a failed attempt.
    pub fn failed() -> Self {
        Self::labelled(FAILED_LABEL)
    }

    fn labelled(label: &str) -> Self {
        Self {
            mode: label.to_string(),
            run_status: label.to_string(),
            alarm_status: label.to_string(),
            alarm_code: None,
            gv0_value: None,
        }
    }

    pub fn is_failure_placeholder(&self) -> bool {
        self.mode == FAILED_LABEL
            && self.run_status == FAILED_LABEL
            && self.alarm_status == FAILED_LABEL
            && self.alarm_code.is_none()
    }

    /// Motion is complete when the robot reports `stopped_label` with no alarm raised.
    pub fn is_motion_complete(&self, stopped_label: &str) -> bool {
        self.run_status == stopped_label && self.alarm_code == Some(0)
    }

    pub fn alarms(&self) -> Vec<AlarmKind> {
        self.alarm_code.map(AlarmKind::decode).unwrap_or_default()
    }
}

/// Alarm bits carried in `alarm_code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    EmergencyStop,
    Servo,
    Brake,
    Algorithm,
    EncoderAngle,
}

impl AlarmKind {
    const ALL: [AlarmKind; 5] = [
        AlarmKind::EmergencyStop,
        AlarmKind::Servo,
        AlarmKind::Brake,
        AlarmKind::Algorithm,
        AlarmKind::EncoderAngle,
    ];

    pub fn bit(self) -> i64 {
        match self {
            AlarmKind::EmergencyStop => 1,
            AlarmKind::Servo => 2,
            AlarmKind::Brake => 4,
            AlarmKind::Algorithm => 8,
            AlarmKind::EncoderAngle => 16,
        }
    }

    pub fn decode(code: i64) -> Vec<AlarmKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| code & kind.bit() != 0)
            .collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            AlarmKind::EmergencyStop => "emergency stop",
            AlarmKind::Servo => "servo",
            AlarmKind::Brake => "brake fault",
            AlarmKind::Algorithm => "algorithm",
            AlarmKind::EncoderAngle => "encoder angle",
        }
    }
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
