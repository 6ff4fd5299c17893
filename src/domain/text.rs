//! Word splitting, display labels and markup escaping

/// Split an identifier into words on case boundaries and separators.
///
/// `firstName` → `first`, `Name`; `store_id` → `store`, `id`;
/// `HTTPServer` → `HTTP`, `Server`; `item2Count` → `item2`, `Count`.
pub fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // aB starts a word; ABc starts a word at B
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Human readable label: words title-cased and joined by spaces.
pub fn labelize(input: &str) -> String {
    let label = split_words(input)
        .iter()
        .map(|w| title_case(w))
        .collect::<Vec<_>>()
        .join(" ");
    if label.is_empty() {
        input.to_string()
    } else {
        label
    }
}

/// Escape text for insertion into HTML content or attribute values
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("firstName"), vec!["first", "Name"]);
        assert_eq!(split_words("store_id"), vec!["store", "id"]);
        assert_eq!(split_words("HTTPServer"), vec!["HTTP", "Server"]);
        assert_eq!(split_words("max-items count"), vec!["max", "items", "count"]);
        assert_eq!(split_words("item2Count"), vec!["item2", "Count"]);
        assert!(split_words("__").is_empty());
    }

    #[test]
    fn test_labelize() {
        assert_eq!(labelize("firstName"), "First Name");
        assert_eq!(labelize("store_id"), "Store Id");
        assert_eq!(labelize("HTTPServer"), "Http Server");
        assert_eq!(labelize("in_stock"), "In Stock");
        assert_eq!(labelize("a"), "A");
        assert_eq!(labelize("--"), "--");
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }
}
