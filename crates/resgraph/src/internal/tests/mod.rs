#[cfg(test)]
mod test_policy;
#[cfg(test)]
mod test_query;

pub mod utils;
