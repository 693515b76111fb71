use std::{fmt, path::Path};

use anyhow::Result;
use bitmask_enum::bitmask;

use crate::{
    addr::Addr,
    cache::{Cache, Install, Lookup},
    config::CacheConfig,
    stat::{Statistics, Summary},
    trace::{AccessKind, AccessRecord, TraceError, TraceReader},
};

#[cfg(feature = "stat")]
use crate::stat::{AddStats, Stats};

/// what a single simulated access did.
#[bitmask(u8)]
pub enum AccessEvents {
    Hit,
    Miss,
    Eviction,
}

impl fmt::Display for AccessEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(Self::Miss) {
            write!(f, "miss")?;
            if self.contains(Self::Eviction) {
                write!(f, " eviction")?;
            }
        } else if self.contains(Self::Hit) {
            write!(f, "hit")?;
        }
        Ok(())
    }
}

/// events of each access a record dispatched, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    events: [AccessEvents; 2],
    len: usize,
}

impl Outcome {
    fn new() -> Self {
        Self {
            events: [AccessEvents::none(); 2],
            len: 0,
        }
    }
    fn push(&mut self, e: AccessEvents) {
        self.events[self.len] = e;
        self.len += 1;
    }
    pub fn events(&self) -> &[AccessEvents] {
        &self.events[..self.len]
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.events().iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Owns the cache and its counters for one replay.
pub struct Simulator {
    config: CacheConfig,
    cache: Cache,
    stat: Statistics,
    records: usize,
    skipped: usize,
}

impl Simulator {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: Cache::new(&config),
            config,
            stat: Statistics::new(),
            records: 0,
            skipped: 0,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
    pub fn statistics(&self) -> &Statistics {
        &self.stat
    }
    pub fn summary(&self) -> Summary {
        self.stat.summary()
    }

    /// simulates one access at `addr`.
    pub fn access(&mut self, addr: Addr) -> AccessEvents {
        let d = self.config.layout().decode(addr);
        log::trace!("access {addr}: tag {:#x} set {}", d.tag, d.set_index);
        if let Lookup::Hit { .. } = self.cache.lookup(d.set_index, d.tag) {
            self.stat.record_hit();
            return AccessEvents::Hit;
        }
        self.stat.record_miss();
        match self.cache.install(d.set_index, d.tag) {
            Install::FilledEmptySlot { .. } => AccessEvents::Miss,
            Install::Evicted { slot, old_tag } => {
                self.stat.record_eviction();
                log::debug!(
                    "set {} slot {slot}: evicted tag {old_tag:#x} for {:#x}",
                    d.set_index,
                    d.tag
                );
                AccessEvents::Miss | AccessEvents::Eviction
            }
        }
    }

    /// dispatches a record as zero, one or two accesses to the same address.
    pub fn dispatch(&mut self, record: &AccessRecord) -> Outcome {
        let mut outcome = Outcome::new();
        match record.kind {
            AccessKind::Instr => self.skipped += 1,
            AccessKind::Load | AccessKind::Store | AccessKind::Modify => {
                self.records += 1;
                for _ in 0..record.kind.accesses() {
                    outcome.push(self.access(record.addr));
                }
            }
        }
        outcome
    }

    /// replays `records` in order. `on_record` sees every dispatched record.
    pub fn replay<I, F>(&mut self, records: I, mut on_record: F) -> Result<()>
    where
        I: IntoIterator<Item = Result<AccessRecord, TraceError>>,
        F: FnMut(&AccessRecord, &Outcome),
    {
        for record in records {
            let record = record?;
            let outcome = self.dispatch(&record);
            if !outcome.is_empty() {
                on_record(&record, &outcome);
            }
        }
        log::info!(
            "replayed {} data records ({} instruction records skipped)",
            self.records,
            self.skipped
        );
        Ok(())
    }

    pub fn replay_file<F>(&mut self, path: impl AsRef<Path>, on_record: F) -> Result<()>
    where
        F: FnMut(&AccessRecord, &Outcome),
    {
        let reader = TraceReader::open(path)?;
        self.replay(reader, on_record)
    }
}

impl Simulator {
    #[cfg(feature = "stat")]
    pub fn collect_stat(&self) -> Stats {
        let mut ss = Stats::default();
        self.add_stats(&mut ss);
        ss
    }
}

#[cfg(feature = "stat")]
impl AddStats for Simulator {
    fn add_stats(&self, buf: &mut Stats) {
        buf.push(Box::new(stat::CacheStat::new(self)));
        buf.push(Box::new(stat::OccupancyStat::new(self)));
    }
}

#[cfg(feature = "stat")]
mod stat {
    use crate::stat::*;

    use super::*;

    pub struct CacheStat {
        summary: Summary,
        accesses: u64,
        records: usize,
        skipped: usize,
        num_sets: usize,
        lines_per_set: usize,
        block_size: u64,
    }

    impl CacheStat {
        pub fn new(sim: &Simulator) -> Self {
            Self {
                summary: sim.summary(),
                accesses: sim.statistics().accesses(),
                records: sim.records,
                skipped: sim.skipped,
                num_sets: sim.config.num_sets(),
                lines_per_set: sim.config.lines_per_set(),
                block_size: sim.config.block_size(),
            }
        }
    }

    impl Stat for CacheStat {
        fn view(&self, _: usize) -> Box<dyn StatView + '_> {
            Box::new(self)
        }
    }

    impl StatView for &'_ CacheStat {
        fn header(&self) -> &'static str {
            "cache stat"
        }
        fn width(&self) -> usize {
            36
        }
    }

    impl fmt::Display for &'_ CacheStat {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let Summary {
                hits,
                misses,
                evictions,
            } = self.summary;
            let geometry = format!(
                "{}x{}x{}B",
                self.num_sets, self.lines_per_set, self.block_size
            );
            writeln!(f, "  geometry (SxExB): {geometry:>15}")?;
            writeln!(f, "  data records: {:>20}", self.records)?;
            writeln!(f, "  instr records skipped: {:>11}", self.skipped)?;
            writeln!(f, "  hits: {hits:>28}")?;
            writeln!(f, "  misses: {misses:>26}")?;
            writeln!(f, "  evictions: {evictions:>23}")?;
            let accesses = self.accesses;
            writeln!(f, "  accesses: {accesses:>24}")?;
            let rate = if accesses == 0 {
                "-".to_string()
            } else {
                format!("{:.2} %", hits as f64 * 100.0 / accesses as f64)
            };
            write!(f, "  hit rate: {rate:>24}")
        }
    }

    /// valid lines per set.
    pub struct OccupancyStat {
        occupied: Vec<usize>,
        lines_per_set: usize,
    }

    impl OccupancyStat {
        pub fn new(sim: &Simulator) -> Self {
            let cache = sim.cache();
            Self {
                occupied: (0..cache.num_sets())
                    .map(|i| cache.set(i).occupied())
                    .collect(),
                lines_per_set: sim.config.lines_per_set(),
            }
        }
    }

    impl Stat for OccupancyStat {
        fn view(&self, max_width: usize) -> Box<dyn StatView + '_> {
            Box::new(OccupancyStatView::new(self, max_width))
        }
    }

    pub struct OccupancyStatView<'a> {
        stat: &'a OccupancyStat,
        columns: usize,
    }

    impl<'a> OccupancyStatView<'a> {
        pub fn new(stat: &'a OccupancyStat, max_width: usize) -> Self {
            Self {
                stat,
                columns: Self::columns(max_width),
            }
        }
    }

    impl StatView for OccupancyStatView<'_> {
        fn header(&self) -> &'static str {
            "set occupancy"
        }
        fn width(&self) -> usize {
            Self::row_width(self.columns)
        }
    }

    impl Columns for OccupancyStatView<'_> {
        const ENTRY_WIDTH: usize = 16;
    }

    impl fmt::Display for OccupancyStatView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let full = self
                .stat
                .occupied
                .iter()
                .filter(|&&n| n == self.stat.lines_per_set)
                .count();
            let entries: Vec<_> = self
                .stat
                .occupied
                .iter()
                .enumerate()
                .filter(|(_, &n)| n != 0)
                .map(|(i, n)| format!("{i:>6}: {n:>8}"))
                .collect();
            writeln!(
                f,
                "  full sets: {full} / {}, touched sets: {}",
                self.stat.occupied.len(),
                entries.len()
            )?;
            for chunk in entries.chunks(self.columns) {
                writeln!(f, "  {}", chunk.join(", "))?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: u32 = 4;
    const S: u32 = 4;

    fn sim(lines_per_set: usize) -> Simulator {
        Simulator::new(CacheConfig::new(B, S, lines_per_set).unwrap())
    }

    /// address for `tag` in `set` with a nonzero block offset.
    fn addr(tag: u64, set: u64) -> Addr {
        Addr::new((tag << (B + S)) | (set << B) | 0x3)
    }

    fn rec(kind: AccessKind, a: Addr) -> Result<AccessRecord, TraceError> {
        Ok(AccessRecord {
            kind,
            addr: a,
            len: 1,
        })
    }

    fn triple(s: &Simulator) -> (u64, u64, u64) {
        let Summary {
            hits,
            misses,
            evictions,
        } = s.summary();
        (hits, misses, evictions)
    }

    #[test]
    fn test_repeat_access() {
        let mut s = sim(1);
        assert_eq!(s.access(addr(1, 2)), AccessEvents::Miss);
        assert_eq!(s.access(addr(1, 2)), AccessEvents::Hit);
        assert_eq!(triple(&s), (1, 1, 0));
    }

    #[test]
    fn test_modify_is_miss_then_hit() {
        let mut s = sim(2);
        let o = s.dispatch(&rec(AccessKind::Modify, addr(9, 0)).unwrap());
        assert_eq!(o.events(), [AccessEvents::Miss, AccessEvents::Hit]);
        assert_eq!(format!("{o}"), "miss hit");
        assert_eq!(triple(&s), (1, 1, 0));
    }

    #[test]
    fn test_direct_mapped_thrash() {
        let mut s = sim(1);
        let events: Vec<_> = [1, 2, 1, 3]
            .into_iter()
            .map(|t| s.access(addr(t, 5)))
            .collect();
        let evict = AccessEvents::Miss | AccessEvents::Eviction;
        assert_eq!(events, [AccessEvents::Miss, evict, evict, evict]);
        assert_eq!(triple(&s), (0, 4, 3));
    }

    #[test]
    fn test_two_way_lru() {
        let mut s = sim(2);
        let (a, b, c) = (addr(1, 7), addr(2, 7), addr(3, 7));
        assert_eq!(s.access(a), AccessEvents::Miss);
        assert_eq!(s.access(b), AccessEvents::Miss);
        assert_eq!(s.access(a), AccessEvents::Hit);
        assert_eq!(s.access(c), AccessEvents::Miss | AccessEvents::Eviction);
        assert_eq!(triple(&s), (1, 3, 1));
        // b was least-recent and is gone, a survived
        assert_eq!(s.access(a), AccessEvents::Hit);
        assert_eq!(s.access(b), AccessEvents::Miss | AccessEvents::Eviction);
    }

    #[test]
    fn test_evictions_only_when_full() {
        let mut s = sim(4);
        for t in 0..4 {
            assert_eq!(s.access(addr(t, 1)), AccessEvents::Miss);
        }
        assert_eq!(s.statistics().evictions(), 0);
        assert_eq!(s.cache().set(1).occupied(), 4);
        assert_eq!(s.access(addr(4, 1)), AccessEvents::Miss | AccessEvents::Eviction);
        assert_eq!(s.cache().set(1).occupied(), 4);
        // evicted tag 0 in slot 0, now most-recent
        let order: Vec<_> = s.cache().set(1).order().iter().collect();
        assert_eq!(order, [1, 2, 3, 0]);
    }

    #[test]
    fn test_set_independence() {
        let pattern = [1u64, 2, 1, 3, 2, 2, 4, 1];
        let mut alone = sim(2);
        let solo: Vec<_> = pattern.iter().map(|&t| alone.access(addr(t, 3))).collect();

        let mut mixed = sim(2);
        let mut interleaved = Vec::new();
        for (i, &t) in pattern.iter().enumerate() {
            mixed.access(addr(t + i as u64, 9));
            interleaved.push(mixed.access(addr(t, 3)));
            mixed.access(addr(t, 10));
        }
        assert_eq!(solo, interleaved);
    }

    #[test]
    fn test_replay_conservation_and_determinism() {
        let trace = "I 0400d7d4,8\n M 0421c7f0,4\n L 04f6b868,8\n S 7ff0005c8,8\n\
                     junk line\n M 0421c7f0,4\n L 04f6b868,8\n S 7ff0005c8,8\n";
        let run = || {
            let mut s = sim(1);
            let mut lines = Vec::new();
            s.replay(TraceReader::new(trace.as_bytes()), |r, o| {
                lines.push(format!("{r} {o}"))
            })
            .unwrap();
            (s.summary(), lines)
        };
        let (summary, lines) = run();
        assert_eq!(summary.hits + summary.misses, 2 + 1 + 1 + 2 + 1 + 1);
        assert!(summary.evictions <= summary.misses);
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "M 421c7f0,4 miss hit");
        assert_eq!(run(), (summary, lines));
    }

    #[test]
    fn test_replay_verbose_lines() {
        let mut s = Simulator::new(CacheConfig::new(4, 1, 1).unwrap());
        let trace = " L 10,1\n M 20,1\n L 22,1\n S 18,1\n L 110,1\n L 210,1\n M 12,1\n";
        let mut lines = Vec::new();
        s.replay(TraceReader::new(trace.as_bytes()), |r, o| {
            lines.push(format!("{r} {o}"))
        })
        .unwrap();
        assert_eq!(
            lines,
            [
                "L 10,1 miss",
                "M 20,1 miss hit",
                "L 22,1 hit",
                "S 18,1 hit",
                "L 110,1 miss eviction",
                "L 210,1 miss eviction",
                "M 12,1 miss eviction hit",
            ]
        );
        assert_eq!(triple(&s), (4, 5, 3));
    }

    #[test]
    fn test_replay_survives_non_utf8_line() {
        let mut s = Simulator::new(CacheConfig::new(4, 1, 1).unwrap());
        let trace: &[u8] = b" L 10,1\n L \xff\xfe,1\n L 10,1\n";
        s.replay(TraceReader::new(trace), |_, _| {}).unwrap();
        assert_eq!(triple(&s), (1, 1, 0));
    }

    #[test]
    fn test_replay_missing_file() {
        let mut s = sim(1);
        assert!(s.replay_file("/nonexistent/trace", |_, _| {}).is_err());
        assert_eq!(triple(&s), (0, 0, 0));
    }

    #[cfg(feature = "stat")]
    #[test]
    fn test_collect_stat() {
        let mut s = sim(2);
        s.access(addr(1, 0));
        s.access(addr(1, 0));
        s.access(addr(2, 5));
        let text = format!("{}", s.collect_stat().view(80));
        assert!(text.contains(&format!("accesses: {:>24}", 3)), "{text}");
        assert!(text.contains("hit rate"), "{text}");
        assert!(text.contains("33.33 %"), "{text}");
        assert!(text.contains("touched sets: 2"), "{text}");
    }
}
