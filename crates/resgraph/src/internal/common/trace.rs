pub struct ScopedTimer<'a> {
    process: &'a str,
    method: &'static str,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(process: &'a str, method: &'static str) -> Self {
        tracing::debug!(
            action = "measure",
            process = process,
            method = method,
            event = "start"
        );
        Self { process, method }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        tracing::debug!(
            action = "measure",
            method = self.method,
            process = self.process,
            event = "end"
        );
    }
}

macro_rules! trace_time {
    ($process:tt, $method:tt, $block:expr) => {{
        let _timer = $crate::internal::common::trace::ScopedTimer::new($process, $method);
        $block
    }};
}

pub fn trace_match_outcome(job_id: u64, status: &str, at: i64, pools: usize) {
    tracing::info!(
        action = "match",
        job = job_id,
        status = status,
        at = at,
        pools = pools
    );
}

pub fn trace_job_release(job_id: u64) {
    tracing::info!(action = "release", job = job_id);
}
