//! Genre distribution over a set of tagged items

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreShare {
    pub genre: String,
    /// Items tagged with this genre
    pub count: usize,
    /// Share of all genre occurrences, 0..=100
    pub percentage: f64,
}

/// Count genre occurrences across `items`.
///
/// Each (item, genre) pair counts once, so an item with three genres adds
/// three occurrences. Percentages are over total occurrences, not items.
/// Sorted by count descending; equal counts keep first-seen order.
pub fn genre_distribution<'a, T, F>(items: &'a [T], genres_of: F) -> Vec<GenreShare>
where
    F: Fn(&'a T) -> &'a [String],
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    let mut total = 0usize;

    for item in items {
        let tags = genres_of(item);
        for (pos, genre) in tags.iter().enumerate() {
            // Repeated tag on the same item
            if tags[..pos].contains(genre) {
                continue;
            }
            total += 1;
            match index.get(genre.as_str()) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    index.insert(genre.as_str(), counts.len());
                    counts.push((genre.as_str(), 1));
                }
            }
        }
    }

    let mut shares: Vec<GenreShare> = counts
        .into_iter()
        .map(|(genre, count)| GenreShare {
            genre: genre.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}
