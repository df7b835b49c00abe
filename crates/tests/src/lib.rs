pub mod fixtures;

#[cfg(test)]
mod meeting_tests;
#[cfg(test)]
mod join_tests;
#[cfg(test)]
mod recording_tests;
#[cfg(test)]
mod hook_tests;
