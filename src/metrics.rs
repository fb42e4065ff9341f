//! Gauge metrics for per-user Maildir fingerprints
//!
//! Walkers publish through the [`MetricsSink`] trait. [`GaugeRegistry`] is
//! the in-process sink: a sharded concurrent map every walker thread writes
//! to without further locking, rendered in the Prometheus text exposition
//! format on demand.

use dashmap::DashMap;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

/// Number of files and folders below the user root
pub const MAILDIR_ELEMENTS: &str = "maildir_elements";
/// Number of folders below the user root
pub const MAILDIR_FOLDERS: &str = "maildir_folders";
/// Number of regular files below the user root
pub const MAILDIR_FILES: &str = "maildir_files";
/// Sum of regular file sizes, labeled with the structural checksum
pub const MAILDIR_SIZE_BYTES: &str = "maildir_size_bytes";
/// Unix time of the last completed walk
pub const MAILDIR_LAST_WALK: &str = "maildir_last_walk_timestamp_seconds";
/// 1 while the user's walker is alive, 0 after it died on an error
pub const MAILDIR_WALKER_UP: &str = "maildir_walker_up";

/// User label name
pub const LABEL_USER: &str = "user";
/// Checksum label name on [`MAILDIR_SIZE_BYTES`]
pub const LABEL_SHA512: &str = "sha512";

/// Destination for gauge observations
///
/// Implementations must accept concurrent calls from every walker thread.
pub trait MetricsSink: Send + Sync {
    /// Set the gauge `name` with `labels` to `value`
    fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64);

    /// Set `labels` to `value`, then remove every other series of `name`
    /// whose labels contain all of `matching`
    ///
    /// The new series is in place before the old ones go, so a concurrent
    /// reader never sees `matching` without a series.
    fn replace_gauge(
        &self,
        name: &str,
        matching: &[(&str, &str)],
        labels: &[(&str, &str)],
        value: f64,
    );
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl SeriesKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut labels: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.sort();
        Self {
            name: name.to_string(),
            labels,
        }
    }

    fn matches(&self, name: &str, matching: &[(&str, &str)]) -> bool {
        self.name == name
            && matching
                .iter()
                .all(|(k, v)| self.labels.iter().any(|(lk, lv)| lk == k && lv == v))
    }
}

/// In-process gauge registry
#[derive(Debug, Default)]
pub struct GaugeRegistry {
    series: DashMap<SeriesKey, f64>,
}

impl GaugeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one series
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.series.get(&SeriesKey::new(name, labels)).map(|v| *v)
    }

    /// Label sets of every series of `name`
    pub fn label_sets(&self, name: &str) -> Vec<Vec<(String, String)>> {
        let mut sets: Vec<_> = self
            .series
            .iter()
            .filter(|e| e.key().name == name)
            .map(|e| e.key().labels.clone())
            .collect();
        sets.sort();
        sets
    }

    /// Total number of series
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Render every series in the Prometheus text exposition format
    pub fn render(&self) -> String {
        let mut rows: Vec<(SeriesKey, f64)> = self
            .series
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        let mut current: Option<&str> = None;

        for (key, value) in &rows {
            if current != Some(key.name.as_str()) {
                let _ = writeln!(out, "# TYPE {} gauge", key.name);
                current = Some(key.name.as_str());
            }

            out.push_str(&key.name);
            if !key.labels.is_empty() {
                out.push('{');
                for (i, (k, v)) in key.labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}=\"{}\"", k, escape_label_value(v));
                }
                out.push('}');
            }
            let _ = writeln!(out, " {}", format_value(*value));
        }

        out
    }

    /// Atomically replace `path` with the current exposition
    ///
    /// Writes `<path>.tmp` first and renames it over `path`, so a textfile
    /// collector never reads a half-written file.
    pub fn write_textfile(&self, path: &Path) -> io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        std::fs::write(tmp, self.render())?;
        std::fs::rename(tmp, path)
    }
}

impl MetricsSink for GaugeRegistry {
    fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.series.insert(SeriesKey::new(name, labels), value);
    }

    fn replace_gauge(
        &self,
        name: &str,
        matching: &[(&str, &str)],
        labels: &[(&str, &str)],
        value: f64,
    ) {
        let current = SeriesKey::new(name, labels);
        self.series.insert(current.clone(), value);
        self.series
            .retain(|key, _| *key == current || !key.matches(name, matching));
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
