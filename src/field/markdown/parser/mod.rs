use pulldown_cmark::{Event, Parser, Tag};

/// Destinations of every image in `src`, in document order.
///
/// Only image start events are inspected, so images nested inside links,
/// lists or block quotes are found too.
pub fn image_destinations(src: &str) -> impl Iterator<Item = String> + '_ {
    Parser::new(src).filter_map(|event| match event {
        Event::Start(Tag::Image { dest_url, .. }) => Some(dest_url.into_string()),
        _ => None,
    })
}
