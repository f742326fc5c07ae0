use crate::feed::{Channel, FeedItem};

/// Descriptions are cut to this many characters, regardless of word boundaries.
pub const DESCRIPTION_LIMIT: usize = 100;
pub const ELLIPSIS: &str = "...";

/// Render one item as a text block:
///
/// ```text
///
/// <channel title>
/// <article title>
/// <description, first 100 chars>...
/// <link>
/// <pubDate>
/// ```
pub fn format_item(item: &FeedItem, channel_title: &str) -> String {
    let description: String = item.description.chars().take(DESCRIPTION_LIMIT).collect();

    format!(
        "\n{channel_title}\n{}\n{description}{ELLIPSIS}\n{}\n{}\n",
        item.title, item.link, item.pub_date
    )
}

/// Render up to `limit` items of a channel, in document order.
pub fn format_channel(channel: &Channel, limit: usize) -> Vec<String> {
    channel
        .items
        .iter()
        .take(limit)
        .map(|item| format_item(item, &channel.title))
        .collect()
}
