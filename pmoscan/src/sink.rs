//! Renderer glue: decoded payloads and the [`DataSink`] trait
//!
//! The scheduler never draws anything. It hands decoded payloads, display
//! delays, the current play time and mode changes to a sink, which a
//! renderer implements. [`TracingSink`] logs them and [`RecordingSink`]
//! keeps them in memory.

use crate::models::{FetchRequest, MediaKind, Millis, ResponseMeta};
use crate::scheduler::StopReason;
use crate::session::PlayMode;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// One scalar point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: Millis,
    pub value: f64,
}

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scalar {
        samples: Vec<Sample>,
    },
    Audio {
        start: Millis,
        duration: Millis,
        data: Vec<u8>,
    },
    Image {
        time: Millis,
        data: Vec<u8>,
    },
    Text {
        time: Millis,
        text: String,
        json: Option<serde_json::Value>,
    },
}

impl Payload {
    /// Decode a data response for the channel the request targeted
    pub fn decode(request: &FetchRequest, meta: &ResponseMeta, body: Vec<u8>) -> Self {
        let time = meta.time.unwrap_or(request.fetch_time);
        match request.media_kind {
            MediaKind::Scalar => Payload::Scalar {
                samples: parse_samples(&String::from_utf8_lossy(&body)),
            },
            MediaKind::Audio => Payload::Audio {
                start: time,
                duration: meta.duration.unwrap_or(request.fetch_duration),
                data: body,
            },
            MediaKind::Image => Payload::Image { time, data: body },
            MediaKind::Text => {
                let text = String::from_utf8_lossy(&body).into_owned();
                let json = if request.channel_path.to_ascii_lowercase().ends_with(".json") {
                    match serde_json::from_str(&text) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            debug!(channel = %request.channel_path, "Text is not valid JSON: {}", e);
                            None
                        }
                    }
                } else {
                    None
                };
                Payload::Text { time, text, json }
            }
        }
    }

    /// Time of the most recent data in the payload, used when the server
    /// sends no `time` header
    pub fn latest_time(&self) -> Option<Millis> {
        match self {
            Payload::Scalar { samples } => samples.iter().map(|s| s.time).reduce(f64::max),
            Payload::Audio {
                start,
                duration,
                data,
            } => (!data.is_empty()).then_some(start + duration),
            Payload::Image { time, .. } | Payload::Text { time, .. } => {
                (*time > 0.0).then_some(*time)
            }
        }
    }
}

/// Parse `"t,v"` lines with `t` in seconds. Malformed lines are skipped.
pub fn parse_samples(body: &str) -> Vec<Sample> {
    body.lines()
        .filter_map(|line| {
            let (time, value) = line.trim().split_once(',')?;
            let time: f64 = time.trim().parse().ok()?;
            let value: f64 = value.trim().parse().ok()?;
            time.is_finite().then_some(Sample {
                time: time * 1000.0,
                value,
            })
        })
        .collect()
}

/// Human label of a view duration
pub fn view_label(view: Millis) -> String {
    const SECOND: f64 = 1000.0;
    const MINUTE: f64 = 60.0 * SECOND;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;

    if view >= DAY {
        format!("{} day", view / DAY)
    } else if view >= HOUR {
        format!("{} hour", view / HOUR)
    } else if view >= MINUTE {
        format!("{} min", view / MINUTE)
    } else if view >= SECOND {
        format!("{} sec", view / SECOND)
    } else {
        format!("{} msec", view)
    }
}

/// Timestamp line shown above the plots: `"dd Mon YYYY HH:MM:SS (view) [RT-x.xs]"`.
///
/// The real-time suffix shows how far the play time trails the wall clock.
/// Returns `None` for an unset time.
pub fn time_label(time: Millis, view: Millis, mode: PlayMode, wall: Millis) -> Option<String> {
    if time == 0.0 || !time.is_finite() {
        return None;
    }
    let date = DateTime::<Utc>::from_timestamp_millis(time as i64)?;
    let mut label = format!("{} ({})", date.format("%d %b %Y %H:%M:%S"), view_label(view));
    if mode == PlayMode::RealTime {
        let lag = (wall - time) / 1000.0;
        if lag >= 0.0 {
            label.push_str(&format!(" [RT-{:.1}s]", lag));
        } else {
            label.push_str(&format!(" [RT+{:.1}s]", -lag));
        }
    }
    Some(label)
}

/// Receiver of everything a renderer needs.
pub trait DataSink: Send {
    fn on_payload(&mut self, channel: &str, payload: Payload);

    fn on_display_delay(&mut self, _group: &str, _delay: Millis) {}

    fn on_time(&mut self, _time: Millis, _mode: PlayMode) {}

    fn on_mode(&mut self, _mode: PlayMode, _reason: Option<StopReason>) {}
}

/// Logs what a renderer would draw
#[derive(Debug, Default)]
pub struct TracingSink {
    view_duration: Millis,
}

impl TracingSink {
    pub fn new(view_duration: Millis) -> Self {
        Self { view_duration }
    }
}

impl DataSink for TracingSink {
    fn on_payload(&mut self, channel: &str, payload: Payload) {
        match payload {
            Payload::Scalar { samples } => {
                let last = samples.last().map(|s| s.value);
                info!(channel, points = samples.len(), ?last, "scalar data");
            }
            Payload::Audio {
                start,
                duration,
                data,
            } => {
                info!(channel, start, duration, bytes = data.len(), "audio data");
            }
            Payload::Image { time, data } => {
                info!(channel, time, bytes = data.len(), "image frame");
            }
            Payload::Text { time, text, json } => {
                info!(channel, time, chars = text.len(), json = json.is_some(), "text frame");
            }
        }
    }

    fn on_display_delay(&mut self, group: &str, delay: Millis) {
        debug!(group, delay, "display delay");
    }

    fn on_time(&mut self, time: Millis, mode: PlayMode) {
        let wall = chrono::Utc::now().timestamp_millis() as f64;
        if let Some(label) = time_label(time, self.view_duration, mode, wall) {
            debug!("{}", label);
        }
    }

    fn on_mode(&mut self, mode: PlayMode, reason: Option<StopReason>) {
        info!(?mode, ?reason, "mode changed");
    }
}

/// Everything a [`RecordingSink`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Payload { channel: String, payload: Payload },
    DisplayDelay { group: String, delay: Millis },
    Time { time: Millis, mode: PlayMode },
    Mode { mode: PlayMode, reason: Option<StopReason> },
}

/// Collects events in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    /// Payloads received for one channel, in order
    pub fn payloads(&self, channel: &str) -> Vec<Payload> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Payload {
                    channel: c,
                    payload,
                } if c == channel => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn modes(&self) -> Vec<(PlayMode, Option<StopReason>)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Mode { mode, reason } => Some((*mode, *reason)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.lock().push(event);
    }
}

impl DataSink for RecordingSink {
    fn on_payload(&mut self, channel: &str, payload: Payload) {
        self.push(SinkEvent::Payload {
            channel: channel.to_string(),
            payload,
        });
    }

    fn on_display_delay(&mut self, group: &str, delay: Millis) {
        self.push(SinkEvent::DisplayDelay {
            group: group.to_string(),
            delay,
        });
    }

    fn on_time(&mut self, time: Millis, mode: PlayMode) {
        self.push(SinkEvent::Time { time, mode });
    }

    fn on_mode(&mut self, mode: PlayMode, reason: Option<StopReason>) {
        self.push(SinkEvent::Mode { mode, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceMode;

    fn request(path: &str, time: Millis, duration: Millis) -> FetchRequest {
        FetchRequest::new(
            path,
            MediaKind::from_path(path),
            ReferenceMode::Absolute,
            time,
            duration,
            1,
        )
    }

    #[test]
    fn test_parse_samples_skips_garbage() {
        let samples = parse_samples("1.5,10\n\nbad line\n2,oops\n2.5, 20.5\n");
        assert_eq!(
            samples,
            vec![
                Sample { time: 1500.0, value: 10.0 },
                Sample { time: 2500.0, value: 20.5 },
            ]
        );
    }

    #[test]
    fn test_scalar_latest_time() {
        let payload = Payload::decode(
            &request("src/a.csv", 0.0, 1000.0),
            &ResponseMeta::default(),
            b"1,1\n3,3\n2,2\n".to_vec(),
        );
        assert_eq!(payload.latest_time(), Some(3000.0));
    }

    #[test]
    fn test_audio_uses_request_range_without_headers() {
        let payload = Payload::decode(
            &request("src/mic.pcm", 1000.0, 500.0),
            &ResponseMeta::default(),
            vec![0u8; 16],
        );
        assert_eq!(payload.latest_time(), Some(1500.0));

        let empty = Payload::decode(&request("src/mic.pcm", 1000.0, 500.0), &ResponseMeta::default(), Vec::new());
        assert_eq!(empty.latest_time(), None);
    }

    #[test]
    fn test_json_text_is_parsed() {
        let meta = ResponseMeta {
            time: Some(5000.0),
            ..ResponseMeta::default()
        };
        let payload = Payload::decode(&request("src/status.json", 0.0, 0.0), &meta, br#"{"ok":true}"#.to_vec());
        match payload {
            Payload::Text { time, json, .. } => {
                assert_eq!(time, 5000.0);
                assert_eq!(json, Some(serde_json::json!({"ok": true})));
            }
            other => panic!("unexpected payload {:?}", other),
        }

        let plain = Payload::decode(&request("src/notes.txt", 0.0, 0.0), &meta, b"{".to_vec());
        assert!(matches!(plain, Payload::Text { json: None, .. }));
    }

    #[test]
    fn test_time_label() {
        // 2021-03-04T05:06:07Z
        let time = 1_614_834_367_000.0;
        assert_eq!(
            time_label(time, 60_000.0, PlayMode::Pause, time).as_deref(),
            Some("04 Mar 2021 05:06:07 (1 min)")
        );
        assert_eq!(
            time_label(time, 10_000.0, PlayMode::RealTime, time + 1_300.0).as_deref(),
            Some("04 Mar 2021 05:06:07 (10 sec) [RT-1.3s]")
        );
        assert_eq!(time_label(0.0, 1000.0, PlayMode::Pause, 0.0), None);
    }

    #[test]
    fn test_recording_sink_shares_log() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();
        writer.on_payload("a", Payload::Scalar { samples: Vec::new() });
        writer.on_mode(PlayMode::Pause, Some(StopReason::Paused));
        assert_eq!(sink.payloads("a").len(), 1);
        assert_eq!(sink.modes(), vec![(PlayMode::Pause, Some(StopReason::Paused))]);
    }
}
