use crate::internal::common::error::RgError;
use crate::internal::planner::quantity::ResourceCounts;
use crate::internal::planner::timeline::{ScheduledPoint, Span, Timeline};
use crate::{Duration, SpanId, Time};

/// Planner tracking several resource types on one shared timeline.
///
/// Every operation takes one count per tracked type, in the order of `resource_types`.
/// Spans are all-or-nothing: a span is inserted only if every dimension fits.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPlanner {
    resource_types: Vec<String>,
    timeline: Timeline<ResourceCounts>,
}

impl MultiPlanner {
    pub fn new(
        base_time: Time,
        duration: Duration,
        totals: &[i64],
        resource_types: &[&str],
    ) -> crate::Result<Self> {
        if totals.is_empty() || totals.len() != resource_types.len() {
            return Err(RgError::InvalidArgument(format!(
                "{} totals given for {} resource types",
                totals.len(),
                resource_types.len()
            )));
        }
        Ok(MultiPlanner {
            resource_types: resource_types.iter().map(|t| t.to_string()).collect(),
            timeline: Timeline::new(base_time, duration, ResourceCounts::from_slice(totals))?,
        })
    }

    fn counts(&self, request: &[i64]) -> crate::Result<ResourceCounts> {
        if request.len() != self.resource_types.len() {
            return Err(RgError::InvalidArgument(format!(
                "{} counts given, planner tracks {} resource types",
                request.len(),
                self.resource_types.len()
            )));
        }
        Ok(ResourceCounts::from_slice(request))
    }

    pub fn reset(&mut self, base_time: Time, duration: Duration) -> crate::Result<()> {
        self.timeline.reset(base_time, duration)
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
    pub fn resources_len(&self) -> usize {
        self.resource_types.len()
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resource_types.iter().map(|t| t.as_str())
    }

    pub fn resource_type_at(&self, index: usize) -> Option<&str> {
        self.resource_types.get(index).map(|t| t.as_str())
    }

    pub fn index_of(&self, resource_type: &str) -> Option<usize> {
        self.resource_types.iter().position(|t| t == resource_type)
    }

    pub fn resource_total_at(&self, index: usize) -> Option<i64> {
        self.timeline.total().get(index).copied()
    }

    pub fn resource_total_by_type(&self, resource_type: &str) -> Option<i64> {
        self.index_of(resource_type)
            .and_then(|index| self.resource_total_at(index))
    }

    pub fn update_totals(&mut self, totals: &[i64]) -> crate::Result<()> {
        let totals = self.counts(totals)?;
        self.timeline.update_total(totals)
    }

    pub fn avail_time_first(
        &mut self,
        on_or_after: Time,
        duration: Duration,
        request: &[i64],
    ) -> crate::Result<Option<Time>> {
        let request = self.counts(request)?;
        self.timeline.avail_time_first(on_or_after, duration, request)
    }

    pub fn avail_time_next(&mut self) -> crate::Result<Option<Time>> {
        self.timeline.avail_time_next()
    }

    pub fn avail_during(&self, at: Time, duration: Duration, request: &[i64]) -> crate::Result<bool> {
        let request = self.counts(request)?;
        self.timeline.avail_during(at, duration, &request)
    }

    pub fn avail_resources_at(&self, at: Time, index: usize) -> crate::Result<i64> {
        let counts = self.timeline.avail_resources_at(at)?;
        counts.get(index).copied().ok_or_else(|| {
            RgError::InvalidArgument(format!("resource index {index} is out of range"))
        })
    }

    pub fn avail_resources_array_at(&self, at: Time) -> crate::Result<ResourceCounts> {
        self.timeline.avail_resources_at(at)
    }

    pub fn avail_resources_array_during(
        &self,
        at: Time,
        duration: Duration,
    ) -> crate::Result<ResourceCounts> {
        self.timeline.avail_resources_during(at, duration)
    }

    pub fn add_span(&mut self, start: Time, duration: Duration, request: &[i64]) -> crate::Result<SpanId> {
        let request = self.counts(request)?;
        self.timeline.add_span(start, duration, request)
    }

    pub fn rem_span(&mut self, span_id: SpanId) -> crate::Result<()> {
        self.timeline.rem_span(span_id)
    }

    pub fn reduce_span(&mut self, span_id: SpanId, amounts: &[i64]) -> crate::Result<bool> {
        let amounts = self.counts(amounts)?;
        self.timeline.reduce_span(span_id, amounts)
    }

    #[inline]
    pub fn span(&self, span_id: SpanId) -> Option<&Span<ResourceCounts>> {
        self.timeline.span(span_id)
    }

    #[inline]
    pub fn span_count(&self) -> usize {
        self.timeline.span_count()
    }

    pub fn points(&self) -> impl Iterator<Item = &ScheduledPoint<ResourceCounts>> {
        self.timeline.points()
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.timeline.point_count()
    }
}
