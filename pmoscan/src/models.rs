//! Data models shared by the scheduler, the transport and the sink

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch on the data timeline, or a duration on it
pub type Millis = f64;

/// Kind of data carried by a channel, resolved once from its path suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Scalar,
    Image,
    Audio,
    Text,
}

/// How a channel's next request is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// One frame near the play time, evaluated every tick
    Frame,
    /// A contiguous range behind the play time, evaluated at the base cadence
    Window,
}

impl MediaKind {
    /// Classify a channel path by its suffix (case-insensitive)
    pub fn from_path(path: &str) -> Self {
        let suffix = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match suffix.as_str() {
            "jpg" | "jpeg" | "png" => MediaKind::Image,
            "txt" | "json" => MediaKind::Text,
            "pcm" | "mp3" | "wav" => MediaKind::Audio,
            _ => MediaKind::Scalar,
        }
    }

    pub fn policy(self) -> FetchPolicy {
        match self {
            MediaKind::Image | MediaKind::Text => FetchPolicy::Frame,
            MediaKind::Scalar | MediaKind::Audio => FetchPolicy::Window,
        }
    }

    pub fn is_frame(self) -> bool {
        self.policy() == FetchPolicy::Frame
    }

    /// Value of the `dt` query parameter
    pub fn data_type(self) -> &'static str {
        match self {
            MediaKind::Scalar => "s",
            _ => "b",
        }
    }

    /// Only image channels can step frame by frame
    pub fn supports_step(self) -> bool {
        self == MediaKind::Image
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaKind::Scalar => "scalar",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Time reference of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    Absolute,
    Newest,
    Oldest,
    Next,
    Prev,
}

impl ReferenceMode {
    /// Value of the `r` query parameter
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceMode::Absolute => "absolute",
            ReferenceMode::Newest => "newest",
            ReferenceMode::Oldest => "oldest",
            ReferenceMode::Next => "next",
            ReferenceMode::Prev => "prev",
        }
    }

    /// Whether the request carries an explicit `t` parameter
    pub fn carries_time(self) -> bool {
        matches!(
            self,
            ReferenceMode::Absolute | ReferenceMode::Next | ReferenceMode::Prev
        )
    }

    /// Next/Prev only make sense for image channels
    pub fn normalize_for(self, kind: MediaKind) -> Self {
        match self {
            ReferenceMode::Next | ReferenceMode::Prev if !kind.supports_step() => {
                ReferenceMode::Absolute
            }
            other => other,
        }
    }
}

/// One outstanding request for a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub channel_path: String,
    pub media_kind: MediaKind,
    pub fetch_time: Millis,
    pub fetch_duration: Millis,
    pub reference: ReferenceMode,
    pub dedupe_token: Option<String>,
    /// Ask only for the time of the referenced sample (`f=t`)
    pub time_only: bool,
    /// Session epoch the request was issued under
    pub epoch: u64,
    /// Registration of the channel it was issued for
    pub generation: u64,
}

impl FetchRequest {
    pub fn new(
        channel_path: impl Into<String>,
        media_kind: MediaKind,
        reference: ReferenceMode,
        fetch_time: Millis,
        fetch_duration: Millis,
        epoch: u64,
    ) -> Self {
        Self {
            channel_path: channel_path.into(),
            media_kind,
            fetch_time,
            fetch_duration: fetch_duration.max(0.0),
            reference: reference.normalize_for(media_kind),
            dedupe_token: None,
            time_only: false,
            epoch,
            generation: 0,
        }
    }

    /// Time-only probe of one of the window edges
    pub fn limit_probe(
        channel_path: impl Into<String>,
        media_kind: MediaKind,
        reference: ReferenceMode,
        epoch: u64,
    ) -> Self {
        Self {
            time_only: true,
            ..Self::new(channel_path, media_kind, reference, 0.0, 0.0, epoch)
        }
    }

    pub fn with_dedupe(mut self, token: Option<String>) -> Self {
        self.dedupe_token = token;
        self
    }

    pub fn for_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    /// End of the requested range
    pub fn end_time(&self) -> Millis {
        self.fetch_time + self.fetch_duration
    }
}

/// Metadata headers attached to a server response, converted to milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
    pub time: Option<Millis>,
    pub duration: Option<Millis>,
    pub oldest: Option<Millis>,
    pub newest: Option<Millis>,
    pub lag_time: Option<Millis>,
}

/// Classified server response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// HTTP 200 with a body
    Data { meta: ResponseMeta, body: Vec<u8> },
    /// HTTP 304, the channel already holds this data
    NotModified,
    /// HTTP 404 or 410, nothing at the requested time
    NoData,
}

/// Format a millisecond timestamp as the shortest decimal seconds string
pub fn format_seconds(millis: Millis) -> String {
    format!("{}", millis / 1000.0)
}
