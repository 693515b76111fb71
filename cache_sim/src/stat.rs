use std::{fmt, fs, io, path::Path};

use serde::Serialize;

/// hit/miss/eviction counters of one replay. only ever incremented.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
    pub fn hits(&self) -> u64 {
        self.hits
    }
    pub fn misses(&self) -> u64 {
        self.misses
    }
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }
    pub fn summary(&self) -> Summary {
        Summary {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

/// final `(hits, misses, evictions)` triple.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Summary {
    /// writes `<hits> <misses> <evictions>` on one line, replacing `path`.
    pub fn write_results(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(
            path,
            format!("{} {} {}\n", self.hits, self.misses, self.evictions),
        )
    }
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits:{} misses:{} evictions:{}",
            self.hits, self.misses, self.evictions
        )
    }
}

#[cfg(feature = "stat")]
pub use view::*;

#[cfg(feature = "stat")]
mod view {
    use std::fmt;

    /// lays fixed-width entries out as `  a, b, c` rows.
    pub trait Columns {
        /// width of one entry
        const ENTRY_WIDTH: usize;

        /// entries per row that fit in `max_width`, at least one.
        fn columns(max_width: usize) -> usize {
            ((max_width.saturating_sub(2) + 2) / (Self::ENTRY_WIDTH + 2)).max(1)
        }
        fn row_width(columns: usize) -> usize {
            2 + columns * Self::ENTRY_WIDTH + columns.saturating_sub(1) * 2
        }
    }

    pub trait Stat {
        fn view(&self, max_width: usize) -> Box<dyn StatView + '_>;
    }

    pub trait StatView: fmt::Display {
        /// header of stat
        fn header(&self) -> &'static str;
        /// body width
        fn width(&self) -> usize;
    }

    pub trait AddStats {
        /// add stat to `buf`.
        fn add_stats(&self, buf: &mut Stats);
    }

    #[derive(Default)]
    pub struct Stats {
        stats: Vec<Box<dyn Stat>>,
    }

    impl Stats {
        pub fn push(&mut self, stat: Box<dyn Stat>) {
            self.stats.push(stat)
        }
        pub fn view(&self, max_width: usize) -> StatsView<'_> {
            StatsView {
                views: self.stats.iter().map(|s| s.view(max_width)).collect(),
            }
        }
    }

    /// every section framed by a rule as wide as the widest one.
    pub struct StatsView<'s> {
        views: Vec<Box<dyn StatView + 's>>,
    }

    const TITLE: &str = " cache statistics ";

    impl fmt::Display for StatsView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let width = self
                .views
                .iter()
                .map(|s| s.header().len().max(s.width()))
                .fold(TITLE.len() + 4, usize::max);
            writeln!(f, "{TITLE:=^width$}")?;
            for (i, sv) in self.views.iter().enumerate() {
                if i != 0 {
                    writeln!(f, "{:-<width$}", "")?;
                }
                writeln!(f, "[{}]", sv.header())?;
                writeln!(f, "{sv}")?;
            }
            write!(f, "{:=<width$}", "")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut s = Statistics::new();
        s.record_miss();
        s.record_miss();
        s.record_eviction();
        s.record_hit();
        assert_eq!(s.accesses(), 3);
        assert_eq!(
            s.summary(),
            Summary {
                hits: 1,
                misses: 2,
                evictions: 1
            }
        );
    }
    #[test]
    fn test_summary_format() {
        let s = Summary {
            hits: 4,
            misses: 5,
            evictions: 3,
        };
        assert_eq!(format!("{s}"), "hits:4 misses:5 evictions:3");
        assert_eq!(
            s.to_json().unwrap(),
            r#"{"hits":4,"misses":5,"evictions":3}"#
        );
    }
    #[cfg(feature = "stat")]
    #[test]
    fn test_columns() {
        struct Entry;
        impl Columns for Entry {
            const ENTRY_WIDTH: usize = 16;
        }
        assert_eq!(Entry::columns(80), 4);
        assert_eq!(Entry::columns(74), 4);
        assert_eq!(Entry::columns(71), 3);
        assert_eq!(Entry::columns(0), 1);
        assert!(Entry::row_width(Entry::columns(80)) <= 80);
        assert_eq!(Entry::row_width(1), 18);
    }
    #[test]
    fn test_write_results() {
        let path = std::env::temp_dir().join(format!("csim_results_{}", std::process::id()));
        let s = Summary {
            hits: 167,
            misses: 71,
            evictions: 67,
        };
        s.write_results(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "167 71 67\n");
        std::fs::remove_file(&path).unwrap();
    }
}
