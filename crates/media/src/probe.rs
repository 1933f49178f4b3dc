//! ffprobe queries: frame-rate variability and basic stream info.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use reelforge_common::error::{ReelError, ReelResult};
use serde::Deserialize;

use crate::runner::{Invocation, ToolRunner};

/// An exact rational number parsed from an ffprobe rate such as `30000/1001`
/// or `29.97/1`. Always stored in lowest terms with a positive denominator,
/// so equal values compare equal field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    /// Parse `a/b`, `a`, or decimal forms of either side.
    ///
    /// Returns `None` for malformed input or a zero denominator.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (top, bottom) = match s.split_once('/') {
            Some((t, b)) => (t, b),
            None => (s, "1"),
        };
        let (tn, td) = parse_decimal(top)?;
        let (bn, bd) = parse_decimal(bottom)?;
        if bn == 0 {
            return None;
        }
        let mut num = tn.checked_mul(bd)?;
        let mut den = td.checked_mul(bn)?;
        if den < 0 {
            num = -num;
            den = -den;
        }
        let divisor = gcd(num, den);
        Some(Self {
            num: num / divisor,
            den: den / divisor,
        })
    }

    /// Largest integer not above the value.
    pub fn floor(self) -> i128 {
        self.num.div_euclid(self.den)
    }

    pub fn to_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

fn gcd(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    // `den` is positive, so the divisor is at least one and fits in i128.
    a.max(1) as i128
}

/// Parse a decimal literal into `numerator / 10^k`.
fn parse_decimal(s: &str) -> Option<(i128, i128)> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Keep the scale within i128 even after cross-multiplication.
    if int_part.len() + frac_part.len() > 18 {
        return None;
    }
    let mut value: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        value = value * 10 + i128::from(b - b'0');
    }
    let scale = 10i128.pow(frac_part.len() as u32);
    Some((if negative { -value } else { value }, scale))
}

/// Outcome of the frame-rate probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRateCheck {
    /// Declared and average rates differ.
    pub variable: bool,
    /// `floor` of the average rate, when it could be determined.
    pub average_fps: Option<u32>,
}

impl FrameRateCheck {
    /// The result reported when the probe could not decide.
    pub fn unknown() -> Self {
        Self {
            variable: false,
            average_fps: None,
        }
    }
}

/// Compare the declared (`r_frame_rate`) and average (`avg_frame_rate`)
/// rates printed by ffprobe, one per token.
pub fn classify_frame_rates(probe_stdout: &str) -> FrameRateCheck {
    let tokens: Vec<&str> = probe_stdout.split_whitespace().collect();
    if tokens.len() < 2 {
        tracing::warn!(output = probe_stdout.trim(), "Frame-rate probe returned too few values");
        return FrameRateCheck::unknown();
    }
    let (Some(declared), Some(average)) = (Rational::parse(tokens[0]), Rational::parse(tokens[1]))
    else {
        tracing::warn!(
            declared = tokens[0],
            average = tokens[1],
            "Could not parse probed frame rates"
        );
        return FrameRateCheck::unknown();
    };

    let variable = declared != average;
    let average_fps = u32::try_from(average.floor()).ok();
    if variable {
        tracing::warn!(
            declared = tokens[0],
            average = tokens[1],
            "Variable frame rate detected"
        );
    }
    FrameRateCheck {
        variable,
        average_fps,
    }
}

/// Probe whether `path` has a variable frame rate.
///
/// Tool errors, timeouts and unparseable output all yield
/// [`FrameRateCheck::unknown`].
pub fn probe_frame_rate(runner: &dyn ToolRunner, path: &Path, timeout: Duration) -> FrameRateCheck {
    let invocation = Invocation::ffprobe([
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=r_frame_rate,avg_frame_rate".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.display().to_string(),
    ])
    .with_timeout(timeout);

    match runner.run(&invocation) {
        Ok(output) if output.success => classify_frame_rates(&output.stdout),
        Ok(output) => {
            tracing::warn!(
                path = %path.display(),
                status = %output.status,
                stderr = %output.stderr.trim(),
                "Frame-rate probe failed"
            );
            FrameRateCheck::unknown()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Frame-rate probe failed");
            FrameRateCheck::unknown()
        }
    }
}

/// Basic properties of a media file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub has_audio: bool,
}

impl MediaInfo {
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<serde_json::Value>,
}

impl ProbeStream {
    /// Display rotation in degrees from the stream tags or display matrix.
    fn rotation(&self) -> i64 {
        if let Some(rotate) = self.tags.get("rotate").and_then(|r| r.trim().parse::<i64>().ok()) {
            return rotate;
        }
        self.side_data_list
            .iter()
            .filter_map(|side| side.get("rotation"))
            .filter_map(|r| r.as_f64())
            .map(|r| r.round() as i64)
            .next()
            .unwrap_or(0)
    }
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Parse `ffprobe -print_format json -show_streams -show_format` output.
pub fn parse_media_info(json: &str) -> ReelResult<MediaInfo> {
    let parsed: ProbeOut = serde_json::from_str(json)
        .map_err(|e| ReelError::probe(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ReelError::probe("no video stream found"))?;
    let width = video
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| ReelError::probe("missing video width from ffprobe"))?;
    let height = video
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| ReelError::probe("missing video height from ffprobe"))?;

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| ReelError::probe("missing duration from ffprobe"))?;

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    // ffmpeg auto-rotates on decode, so a quarter turn swaps the frame size.
    let (width, height) = if video.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    Ok(MediaInfo {
        width,
        height,
        duration_secs,
        has_audio,
    })
}

/// Probe a media file's size, duration and audio presence.
pub fn probe_media(runner: &dyn ToolRunner, path: &Path) -> ReelResult<MediaInfo> {
    let invocation = Invocation::ffprobe([
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_streams".to_string(),
        "-show_format".to_string(),
        path.display().to_string(),
    ]);
    let output = runner.run_checked(&invocation)?;
    parse_media_info(&output.stdout)
        .map_err(|e| ReelError::probe(format!("{}: {e}", path.display())))
}
