use crate::internal::common::error::RgError;
use crate::internal::planner::timeline::{ScheduledPoint, Span, Timeline};
use crate::{Duration, SpanId, Time};

/// Tracks how many units of a single resource type are free at every point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Planner {
    resource_type: String,
    timeline: Timeline<i64>,
}

impl Planner {
    pub fn new(
        base_time: Time,
        duration: Duration,
        total: i64,
        resource_type: &str,
    ) -> crate::Result<Self> {
        Ok(Planner {
            resource_type: resource_type.to_string(),
            timeline: Timeline::new(base_time, duration, total)?,
        })
    }

    /// Drops every span and starts over with a new horizon.
    pub fn reset(&mut self, base_time: Time, duration: Duration) -> crate::Result<()> {
        self.timeline.reset(base_time, duration)
    }

    #[inline]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    #[inline]
    pub fn base_time(&self) -> Time {
        self.timeline.plan_start()
    }

    #[inline]
    pub fn plan_end(&self) -> Time {
        self.timeline.plan_end()
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        (self.timeline.plan_end() - self.timeline.plan_start()) as Duration
    }

    #[inline]
    pub fn total(&self) -> i64 {
        *self.timeline.total()
    }

    /// Changes the capacity of the planner. Free counts are recomputed for every point
    /// and never drop below zero.
    pub fn update_total(&mut self, total: i64) -> crate::Result<()> {
        log::debug!(
            "Planner '{}' total changed {} -> {total}",
            self.resource_type,
            self.total()
        );
        self.timeline.update_total(total)
    }

    pub fn avail_time_first(
        &mut self,
        on_or_after: Time,
        duration: Duration,
        request: i64,
    ) -> crate::Result<Option<Time>> {
        self.timeline.avail_time_first(on_or_after, duration, request)
    }

    pub fn avail_time_next(&mut self) -> crate::Result<Option<Time>> {
        self.timeline.avail_time_next()
    }

    pub fn unavail_time_first(&self, on_or_after: Time, request: i64) -> crate::Result<Option<Time>> {
        self.timeline.unavail_time_first(on_or_after, &request)
    }

    pub fn avail_during(&self, at: Time, duration: Duration, request: i64) -> crate::Result<bool> {
        self.timeline.avail_during(at, duration, &request)
    }

    pub fn avail_resources_during(&self, at: Time, duration: Duration) -> crate::Result<i64> {
        self.timeline.avail_resources_during(at, duration)
    }

    pub fn avail_resources_at(&self, at: Time) -> crate::Result<i64> {
        self.timeline.avail_resources_at(at)
    }

    pub fn add_span(&mut self, start: Time, duration: Duration, request: i64) -> crate::Result<SpanId> {
        if request > self.total() {
            return Err(RgError::CapacityExceeded(format!(
                "request {request} exceeds total {} of '{}'",
                self.total(),
                self.resource_type
            )));
        }
        let span_id = self.timeline.add_span(start, duration, request)?;
        log::trace!(
            "Planner '{}': span {span_id} reserves {request} in [{start}, +{duration})",
            self.resource_type
        );
        Ok(span_id)
    }

    pub fn rem_span(&mut self, span_id: SpanId) -> crate::Result<()> {
        self.timeline.rem_span(span_id)?;
        log::trace!("Planner '{}': span {span_id} released", self.resource_type);
        Ok(())
    }

    pub fn reduce_span(&mut self, span_id: SpanId, amount: i64) -> crate::Result<bool> {
        self.timeline.reduce_span(span_id, amount)
    }

    #[inline]
    pub fn span(&self, span_id: SpanId) -> Option<&Span<i64>> {
        self.timeline.span(span_id)
    }

    pub fn spans(&self) -> impl Iterator<Item = &Span<i64>> {
        self.timeline.spans()
    }

    #[inline]
    pub fn span_count(&self) -> usize {
        self.timeline.span_count()
    }

    pub fn is_active_span(&self, span_id: SpanId, at: Time) -> bool {
        self.timeline
            .span(span_id)
            .is_some_and(|span| span.is_active_at(at))
    }

    pub fn points(&self) -> impl Iterator<Item = &ScheduledPoint<i64>> {
        self.timeline.points()
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.timeline.point_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_above_total_is_capacity_error() {
        let mut planner = Planner::new(0, 100, 4, "core").unwrap();
        assert!(matches!(
            planner.add_span(0, 10, 5),
            Err(RgError::CapacityExceeded(_))
        ));
        assert_eq!(planner.span_count(), 0);
    }

    #[test]
    fn active_span() {
        let mut planner = Planner::new(0, 100, 4, "core").unwrap();
        let span = planner.add_span(10, 10, 1).unwrap();
        assert!(!planner.is_active_span(span, 9));
        assert!(planner.is_active_span(span, 10));
        assert!(planner.is_active_span(span, 19));
        assert!(!planner.is_active_span(span, 20));
        assert!(!planner.is_active_span(SpanId::new(100), 10));
    }
}
