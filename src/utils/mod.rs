pub(crate) mod extent;

/// Joins displayable items into a comma separated list for messages.
pub(crate) fn join_display<Item: core::fmt::Display, Iter: IntoIterator<Item = Item>>(items: Iter) -> String {
    items.into_iter().fold(String::new(),|mut result, item| {
        if !result.is_empty() {
            result.push_str(", ");
        }
        result.push_str(&item.to_string());
        result
    })
}
