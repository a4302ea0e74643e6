//! 点位调度：把 (点位, 扫描周期) 换算成每个 tick 的到期集合。
//!
//! tick 分辨率取所有周期（毫秒）的最大公约数，且不小于 `min_tick`。
//! 每个点位的 tick 周期为 `interval / resolution` 向下取整（至少 1），
//! 因此点位被读取的频率只会高于或等于配置值。

use domain::TagConfig;
use plc_protocol::TagRequest;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct ScheduledTag {
    request: TagRequest,
    period: u64,
}

#[derive(Debug, Clone)]
pub struct TagSchedule {
    resolution: Duration,
    tags: Vec<ScheduledTag>,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// 周期按毫秒取整，避免 0.3s 这类浮点值被截成 299ms。
fn interval_ms(tag: &TagConfig) -> Option<u64> {
    tag.scan_interval()?;
    Some(((tag.scan_interval_secs * 1000.0).round() as u64).max(1))
}

impl TagSchedule {
    /// 非法周期（≤0）的点位按最小 tick 调度；启动校验会先拒绝这类配置。
    pub fn new(tags: &[TagConfig], min_tick: Duration) -> Self {
        let min_tick_ms = (min_tick.as_millis() as u64).max(1);
        let common = tags
            .iter()
            .filter_map(interval_ms)
            .fold(0, gcd);
        let resolution_ms = common.max(min_tick_ms);
        let tags = tags
            .iter()
            .map(|tag| {
                let period = interval_ms(tag)
                    .map(|ms| (ms / resolution_ms).max(1))
                    .unwrap_or(1);
                ScheduledTag {
                    request: TagRequest::new(tag.name.clone(), tag.data_type),
                    period,
                }
            })
            .collect();
        Self {
            resolution: Duration::from_millis(resolution_ms),
            tags,
        }
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// 第 `tick` 个 tick 到期的点位，按配置顺序。纯函数。
    pub fn due_tags(&self, tick: u64) -> Vec<TagRequest> {
        self.tags
            .iter()
            .filter(|tag| tick % tag.period == 0)
            .map(|tag| tag.request.clone())
            .collect()
    }

    /// 点位的 tick 周期
    pub fn period_of(&self, tag_name: &str) -> Option<u64> {
        self.tags
            .iter()
            .find(|tag| tag.request.name == tag_name)
            .map(|tag| tag.period)
    }

    /// 按 tick 周期分桶的点位名
    pub fn buckets(&self) -> BTreeMap<u64, Vec<&str>> {
        let mut buckets: BTreeMap<u64, Vec<&str>> = BTreeMap::new();
        for tag in &self.tags {
            buckets
                .entry(tag.period)
                .or_default()
                .push(tag.request.name.as_str());
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(requests: &[TagRequest]) -> Vec<&str> {
        requests.iter().map(|r| r.name.as_str()).collect()
    }

    fn min_tick() -> Duration {
        Duration::from_millis(100)
    }

    #[test]
    fn resolution_is_gcd_of_intervals() {
        let schedule = TagSchedule::new(
            &[TagConfig::new("A", 1.0), TagConfig::new("B", 5.0)],
            min_tick(),
        );
        assert_eq!(schedule.resolution(), Duration::from_secs(1));
        assert_eq!(schedule.period_of("A"), Some(1));
        assert_eq!(schedule.period_of("B"), Some(5));

        let schedule = TagSchedule::new(
            &[TagConfig::new("A", 1.5), TagConfig::new("B", 2.5)],
            min_tick(),
        );
        assert_eq!(schedule.resolution(), Duration::from_millis(500));
        assert_eq!(schedule.period_of("A"), Some(3));
        assert_eq!(schedule.period_of("B"), Some(5));
    }

    #[test]
    fn resolution_is_bounded_by_min_tick() {
        let schedule = TagSchedule::new(
            &[TagConfig::new("A", 0.25), TagConfig::new("B", 0.33)],
            min_tick(),
        );
        // gcd(250, 330) = 10ms，被抬到 100ms；周期向下取整
        assert_eq!(schedule.resolution(), Duration::from_millis(100));
        assert_eq!(schedule.period_of("A"), Some(2));
        assert_eq!(schedule.period_of("B"), Some(3));
    }

    #[test]
    fn interval_below_resolution_is_every_tick() {
        let schedule = TagSchedule::new(&[TagConfig::new("A", 0.05)], min_tick());
        assert_eq!(schedule.resolution(), Duration::from_millis(100));
        assert_eq!(schedule.period_of("A"), Some(1));
    }

    #[test]
    fn tick_zero_contains_every_tag_once() {
        let tags: Vec<TagConfig> = [1.0, 2.0, 3.0, 7.0, 0.5]
            .iter()
            .enumerate()
            .map(|(i, secs)| TagConfig::new(format!("T{}", i), *secs))
            .collect();
        let schedule = TagSchedule::new(&tags, min_tick());
        let due = schedule.due_tags(0);
        assert_eq!(names(&due), vec!["T0", "T1", "T2", "T3", "T4"]);
    }

    #[test]
    fn tags_reappear_at_their_period() {
        let tags = [TagConfig::new("A", 1.0), TagConfig::new("B", 5.0)];
        let schedule = TagSchedule::new(&tags, min_tick());
        for tick in 0..20u64 {
            let due = schedule.due_tags(tick);
            let due = names(&due);
            assert!(due.contains(&"A"));
            assert_eq!(due.contains(&"B"), tick % 5 == 0, "tick {}", tick);
        }
        assert_eq!(names(&schedule.due_tags(5)), vec!["A", "B"]);
    }

    #[test]
    fn rounding_never_scans_less_often() {
        let tags = [TagConfig::new("A", 0.3), TagConfig::new("B", 0.35)];
        let schedule = TagSchedule::new(&tags, min_tick());
        let resolution = schedule.resolution().as_millis() as u64;
        for tag in &tags {
            let period = schedule.period_of(&tag.name).unwrap();
            let interval = (tag.scan_interval_secs * 1000.0).round() as u64;
            assert!(period * resolution <= interval);
        }
        let buckets = schedule.buckets();
        assert_eq!(buckets.get(&3), Some(&vec!["A", "B"]));
    }

    #[test]
    fn empty_schedule_uses_min_tick() {
        let schedule = TagSchedule::new(&[], min_tick());
        assert!(schedule.is_empty());
        assert_eq!(schedule.resolution(), min_tick());
        assert!(schedule.due_tags(0).is_empty());
    }
}
