pub mod slug;
pub mod text;

pub use slug::slugify;
pub use text::{escape_html, reading_time_minutes, truncate_on_word, word_count};
