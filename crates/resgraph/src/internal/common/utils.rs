use crate::{Duration, Time};

/// Checks at compile-time that the given type $ty has the corresponding $size.
///
/// It can be used to prevent performance-critical data structures to grow in size unexpectedly.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

/// Exclusive end of the window `[at, at + duration)`, `None` on overflow.
#[inline]
pub fn window_end(at: Time, duration: Duration) -> Option<Time> {
    i64::try_from(duration)
        .ok()
        .and_then(|duration| at.checked_add(duration))
}

pub fn format_comma_delimited<I: IntoIterator<Item = T>, T: std::fmt::Display>(items: I) -> String {
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_end_overflow() {
        assert_eq!(window_end(10, 5), Some(15));
        assert_eq!(window_end(i64::MAX - 1, 5), None);
        assert_eq!(window_end(0, u64::MAX), None);
    }

    #[test]
    fn comma_delimited() {
        assert_eq!(format_comma_delimited(["a", "b"]), "a,b");
        assert_eq!(format_comma_delimited(Vec::<u32>::new()), "");
    }
}
