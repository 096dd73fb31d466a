#[cfg(test)]
pub mod graph;
#[cfg(test)]
pub mod jobspec;

pub fn sorted_vec<T: Ord>(mut vec: Vec<T>) -> Vec<T> {
    vec.sort();
    vec
}

#[allow(unused)]
#[cfg(test)]
pub fn enable_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
pub fn expect_error_message<T: std::fmt::Debug>(result: crate::Result<T>, msg: &str) {
    match result {
        Ok(value) => panic!("Expected error, got Ok({value:?})"),
        Err(error) => {
            let formatted = error.to_string();
            if !formatted.contains(msg) {
                panic!("Did not find `{msg}` in `{formatted}`");
            }
        }
    }
}
