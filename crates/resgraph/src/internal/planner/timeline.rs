use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use serde::Serialize;

use crate::internal::common::error::RgError;
use crate::internal::common::utils::window_end;
use crate::internal::planner::quantity::Quantity;
use crate::{Duration, SpanId, Time};

/// State of the timeline from `at` up to the next point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledPoint<Q> {
    pub at: Time,
    pub scheduled: Q,
    pub remaining: Q,
}

crate::static_assert_size!(ScheduledPoint<i64>, 24);

/// Reservation of `planned` resources over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span<Q> {
    id: SpanId,
    start: Time,
    end: Time,
    planned: Q,
}

impl<Q> Span<Q> {
    #[inline]
    pub fn id(&self) -> SpanId {
        self.id
    }

    #[inline]
    pub fn start(&self) -> Time {
        self.start
    }

    /// Exclusive end of the span.
    #[inline]
    pub fn end(&self) -> Time {
        self.end
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        (self.end - self.start) as Duration
    }

    #[inline]
    pub fn planned(&self) -> &Q {
        &self.planned
    }

    #[inline]
    pub fn is_active_at(&self, at: Time) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Debug, Clone)]
struct AvailQuery<Q> {
    request: Q,
    duration: Duration,
    last_start: Time,
}

/// Timeline shared by the single and multi resource planners.
///
/// Points are kept in canonical form: there is always a point at `plan_start` and no
/// two neighbouring points carry the same scheduled counts. Since a span only changes points
/// inside its own range, only its two boundaries can become redundant, so insert and
/// removal coalesce just those.
#[derive(Debug, Clone)]
pub(crate) struct Timeline<Q: Quantity> {
    plan_start: Time,
    plan_end: Time,
    total: Q,
    points: BTreeMap<Time, ScheduledPoint<Q>>,
    spans: BTreeMap<SpanId, Span<Q>>,
    span_counter: u64,
    avail_query: Option<AvailQuery<Q>>,
}

impl<Q: Quantity> Timeline<Q> {
    pub fn new(base_time: Time, duration: Duration, total: Q) -> crate::Result<Self> {
        if total.has_negative() {
            return Err(RgError::InvalidArgument(format!(
                "planner total {total:?} must not be negative"
            )));
        }
        let plan_end = Self::horizon_end(base_time, duration)?;
        let mut timeline = Timeline {
            plan_start: base_time,
            plan_end,
            total,
            points: BTreeMap::new(),
            spans: BTreeMap::new(),
            span_counter: 0,
            avail_query: None,
        };
        timeline.insert_base_point();
        Ok(timeline)
    }

    fn horizon_end(base_time: Time, duration: Duration) -> crate::Result<Time> {
        if duration == 0 {
            return Err(RgError::InvalidArgument(
                "planner duration must be positive".to_string(),
            ));
        }
        window_end(base_time, duration).ok_or_else(|| {
            RgError::InvalidArgument(format!(
                "planner horizon {base_time}+{duration} overflows"
            ))
        })
    }

    fn insert_base_point(&mut self) {
        let zero = self.total.zero_like();
        self.points.insert(
            self.plan_start,
            ScheduledPoint {
                at: self.plan_start,
                scheduled: zero,
                remaining: self.total.clone(),
            },
        );
    }

    pub fn reset(&mut self, base_time: Time, duration: Duration) -> crate::Result<()> {
        self.plan_end = Self::horizon_end(base_time, duration)?;
        self.plan_start = base_time;
        self.points.clear();
        self.spans.clear();
        self.avail_query = None;
        self.insert_base_point();
        Ok(())
    }

    #[inline]
    pub fn plan_start(&self) -> Time {
        self.plan_start
    }

    #[inline]
    pub fn plan_end(&self) -> Time {
        self.plan_end
    }

    #[inline]
    pub fn total(&self) -> &Q {
        &self.total
    }

    /// Neighbouring points whose free counts both clamp to zero stay separate, since
    /// their scheduled counts still differ and span removal relies on them.
    pub fn update_total(&mut self, total: Q) -> crate::Result<()> {
        if total.has_negative() || total.dimensions() != self.total.dimensions() {
            return Err(RgError::InvalidArgument(format!(
                "invalid planner total {total:?}"
            )));
        }
        self.total = total;
        for point in self.points.values_mut() {
            point.remaining = Q::remaining(&self.total, &point.scheduled);
        }
        self.avail_query = None;
        Ok(())
    }

    pub fn points(&self) -> impl Iterator<Item = &ScheduledPoint<Q>> {
        self.points.values()
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn spans(&self) -> impl Iterator<Item = &Span<Q>> {
        self.spans.values()
    }

    #[inline]
    pub fn span(&self, span_id: SpanId) -> Option<&Span<Q>> {
        self.spans.get(&span_id)
    }

    #[inline]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    fn check_window(&self, at: Time, duration: Duration) -> crate::Result<Time> {
        if duration == 0 {
            return Err(RgError::InvalidArgument(
                "duration must be positive".to_string(),
            ));
        }
        match window_end(at, duration) {
            Some(end) if at >= self.plan_start && end <= self.plan_end => Ok(end),
            _ => Err(RgError::InvalidArgument(format!(
                "window {at}+{duration} is outside of planner horizon [{}, {})",
                self.plan_start, self.plan_end
            ))),
        }
    }

    fn check_request(&self, request: &Q) -> crate::Result<()> {
        if request.dimensions() != self.total.dimensions() {
            return Err(RgError::InvalidArgument(format!(
                "request {request:?} does not match planner dimensions {}",
                self.total.dimensions()
            )));
        }
        if request.has_negative() {
            return Err(RgError::InvalidArgument(format!(
                "request {request:?} must not be negative"
            )));
        }
        Ok(())
    }

    /// Points describing `[start, end)`: the point in effect at `start` followed by every
    /// point strictly inside the window.
    fn covering(&self, start: Time, end: Time) -> impl Iterator<Item = &ScheduledPoint<Q>> {
        let first = self.points.range(..=start).next_back().map(|(_, p)| p);
        let rest = if end > start {
            Some(
                self.points
                    .range((Excluded(start), Excluded(end)))
                    .map(|(_, p)| p),
            )
        } else {
            None
        };
        first.into_iter().chain(rest.into_iter().flatten())
    }

    pub fn avail_during(&self, at: Time, duration: Duration, request: &Q) -> crate::Result<bool> {
        let end = self.check_window(at, duration)?;
        self.check_request(request)?;
        Ok(self
            .covering(at, end)
            .all(|point| point.remaining.covers(request)))
    }

    /// Minimum amount of free resources over the window.
    pub fn avail_resources_during(&self, at: Time, duration: Duration) -> crate::Result<Q> {
        let end = self.check_window(at, duration)?;
        let mut points = self.covering(at, end);
        let mut min = match points.next() {
            Some(point) => point.remaining.clone(),
            None => return Err(RgError::GenericError("planner has no base point".into())),
        };
        for point in points {
            min.min_assign(&point.remaining);
        }
        Ok(min)
    }

    pub fn avail_resources_at(&self, at: Time) -> crate::Result<Q> {
        if at < self.plan_start || at >= self.plan_end {
            return Err(RgError::InvalidArgument(format!(
                "time {at} is outside of planner horizon [{}, {})",
                self.plan_start, self.plan_end
            )));
        }
        self.covering(at, at)
            .next()
            .map(|point| point.remaining.clone())
            .ok_or_else(|| RgError::GenericError("planner has no base point".into()))
    }

    /// Earliest start `>= from` (either `from` itself or a point time) at which the
    /// request fits for the whole duration.
    fn earliest_fit(&self, from: Time, duration: Duration, request: &Q) -> Option<Time> {
        let length = i64::try_from(duration).ok()?;
        let mut candidate: Option<Time> = None;
        for point in self.covering(from, self.plan_end) {
            let t = point.at.max(from);
            if let Some(start) = candidate {
                if t - start >= length {
                    break;
                }
            }
            if point.remaining.covers(request) {
                if candidate.is_none() {
                    candidate = Some(t);
                }
            } else {
                candidate = None;
            }
        }
        candidate.filter(|start| window_end(*start, duration).is_some_and(|end| end <= self.plan_end))
    }

    pub fn avail_time_first(
        &mut self,
        on_or_after: Time,
        duration: Duration,
        request: Q,
    ) -> crate::Result<Option<Time>> {
        if on_or_after < self.plan_start {
            return Err(RgError::InvalidArgument(format!(
                "time {on_or_after} precedes planner start {}",
                self.plan_start
            )));
        }
        if duration == 0 {
            return Err(RgError::InvalidArgument(
                "duration must be positive".to_string(),
            ));
        }
        self.check_request(&request)?;
        self.avail_query = None;
        if on_or_after >= self.plan_end || !self.total.covers(&request) {
            return Ok(None);
        }
        let found = self.earliest_fit(on_or_after, duration, &request);
        if let Some(start) = found {
            self.avail_query = Some(AvailQuery {
                request,
                duration,
                last_start: start,
            });
        }
        Ok(found)
    }

    /// Continues the last `avail_time_first` query with the next later point time at
    /// which the request fits.
    pub fn avail_time_next(&mut self) -> crate::Result<Option<Time>> {
        let Some(query) = self.avail_query.take() else {
            return Err(RgError::InvalidArgument(
                "no availability query in progress".to_string(),
            ));
        };
        let next_point = self
            .points
            .range((Excluded(query.last_start), Unbounded))
            .next()
            .map(|(at, _)| *at);
        let found =
            next_point.and_then(|from| self.earliest_fit(from, query.duration, &query.request));
        if let Some(start) = found {
            self.avail_query = Some(AvailQuery {
                last_start: start,
                ..query
            });
        }
        Ok(found)
    }

    /// Earliest time `>= on_or_after` at which the request does not fit.
    pub fn unavail_time_first(&self, on_or_after: Time, request: &Q) -> crate::Result<Option<Time>> {
        self.check_request(request)?;
        if on_or_after < self.plan_start {
            return Err(RgError::InvalidArgument(format!(
                "time {on_or_after} precedes planner start {}",
                self.plan_start
            )));
        }
        Ok(self
            .covering(on_or_after, self.plan_end)
            .find(|point| !point.remaining.covers(request))
            .map(|point| point.at.max(on_or_after)))
    }

    /// Makes sure a point exists at `at`; a new point inherits its predecessor's counts.
    fn split_at(&mut self, at: Time) {
        if self.points.contains_key(&at) {
            return;
        }
        if let Some((_, prev)) = self.points.range(..at).next_back() {
            let point = ScheduledPoint {
                at,
                scheduled: prev.scheduled.clone(),
                remaining: prev.remaining.clone(),
            };
            self.points.insert(at, point);
        }
    }

    fn coalesce_at(&mut self, at: Time) {
        if at == self.plan_start {
            return;
        }
        let redundant = match (
            self.points.range(..at).next_back(),
            self.points.get(&at),
        ) {
            (Some((_, prev)), Some(point)) => {
                prev.scheduled == point.scheduled && prev.remaining == point.remaining
            }
            _ => false,
        };
        if redundant {
            self.points.remove(&at);
        }
    }

    fn apply(&mut self, start: Time, end: Time, amount: &Q, reserve: bool) {
        self.split_at(start);
        self.split_at(end);
        for point in self.points.range_mut(start..end).map(|(_, p)| p) {
            if reserve {
                point.scheduled.add_assign(amount);
            } else {
                point.scheduled.sub_assign(amount);
            }
            point.remaining = Q::remaining(&self.total, &point.scheduled);
        }
        self.coalesce_at(start);
        self.coalesce_at(end);
        self.avail_query = None;
    }

    pub fn add_span(&mut self, start: Time, duration: Duration, request: Q) -> crate::Result<SpanId> {
        let end = self.check_window(start, duration)?;
        self.check_request(&request)?;
        if !self
            .covering(start, end)
            .all(|point| point.remaining.covers(&request))
        {
            return Err(RgError::CapacityExceeded(format!(
                "{request:?} is not available in [{start}, {end})"
            )));
        }
        self.apply(start, end, &request, true);
        self.span_counter += 1;
        let id = SpanId::new(self.span_counter);
        self.spans.insert(
            id,
            Span {
                id,
                start,
                end,
                planned: request,
            },
        );
        Ok(id)
    }

    pub fn rem_span(&mut self, span_id: SpanId) -> crate::Result<()> {
        let span = self.spans.remove(&span_id).ok_or_else(|| {
            RgError::InconsistentRelease(format!("span {span_id} does not exist"))
        })?;
        if !self
            .covering(span.start, span.end)
            .all(|point| point.scheduled.covers(&span.planned))
        {
            self.spans.insert(span_id, span);
            return Err(RgError::InconsistentRelease(format!(
                "span {span_id} is not backed by the planner points"
            )));
        }
        self.apply(span.start, span.end, &span.planned, false);
        Ok(())
    }

    /// Releases `amount` of the span's resources; the span is removed once nothing is
    /// planned in it. Returns true if the span was removed.
    pub fn reduce_span(&mut self, span_id: SpanId, amount: Q) -> crate::Result<bool> {
        self.check_request(&amount)?;
        let span = self.spans.get(&span_id).ok_or_else(|| {
            RgError::InconsistentRelease(format!("span {span_id} does not exist"))
        })?;
        if !span.planned.covers(&amount) {
            return Err(RgError::InconsistentRelease(format!(
                "cannot reduce span {span_id} planning {:?} by {amount:?}",
                span.planned
            )));
        }
        if span.planned == amount {
            self.rem_span(span_id)?;
            return Ok(true);
        }
        let (start, end) = (span.start, span.end);
        self.apply(start, end, &amount, false);
        if let Some(span) = self.spans.get_mut(&span_id) {
            span.planned.sub_assign(&amount);
        }
        Ok(false)
    }
}

impl<Q: Quantity> PartialEq for Timeline<Q> {
    fn eq(&self, other: &Self) -> bool {
        self.plan_start == other.plan_start
            && self.plan_end == other.plan_end
            && self.total == other.total
            && self.points == other.points
            && self.spans == other.spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_list(timeline: &Timeline<i64>) -> Vec<(Time, i64)> {
        timeline.points().map(|p| (p.at, p.remaining)).collect()
    }

    #[test]
    fn split_inherits_predecessor() {
        let mut t = Timeline::new(0, 100, 10i64).unwrap();
        t.add_span(10, 10, 4).unwrap();
        t.split_at(15);
        assert_eq!(point_list(&t), vec![(0, 10), (10, 6), (15, 6), (20, 10)]);
        t.coalesce_at(15);
        assert_eq!(point_list(&t), vec![(0, 10), (10, 6), (20, 10)]);
    }

    #[test]
    fn adjacent_spans_with_same_amount_coalesce() {
        let mut t = Timeline::new(0, 100, 10i64).unwrap();
        t.add_span(0, 10, 3).unwrap();
        t.add_span(10, 10, 3).unwrap();
        assert_eq!(point_list(&t), vec![(0, 7), (20, 10)]);
    }

    #[test]
    fn release_of_coalesced_boundary_recreates_it() {
        let mut t = Timeline::new(0, 100, 10i64).unwrap();
        let a = t.add_span(0, 10, 3).unwrap();
        t.add_span(10, 10, 3).unwrap();
        t.rem_span(a).unwrap();
        assert_eq!(point_list(&t), vec![(0, 10), (10, 7), (20, 10)]);
    }

    #[test]
    fn earliest_fit_starts_inside_a_region() {
        let mut t = Timeline::new(0, 100, 4i64).unwrap();
        t.add_span(20, 10, 4).unwrap();
        assert_eq!(t.earliest_fit(5, 10, &1), Some(5));
        assert_eq!(t.earliest_fit(15, 10, &1), Some(30));
        assert_eq!(t.earliest_fit(95, 10, &1), None);
    }
}
