//! Line reconstruction from positioned fragments
//!
//! PDFs expose no row structure; visual lines are rebuilt by y-proximity
//! and ordered into reading order (left-to-right, top-to-bottom,
//! page-ascending).

use crate::extractor::TextFragment;

/// A reconstructed visual line of fragments sharing a baseline
#[derive(Debug, Clone)]
pub struct Line {
    /// Representative baseline y, seeded by the line's first fragment
    pub y: f32,
    pub page: u32,
    /// Fragments in left-to-right order (after reconstruction)
    pub fragments: Vec<TextFragment>,
}

impl Line {
    /// Concatenated fragment text, space-joined
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Group fragments into visual lines, in document reading order.
///
/// Each fragment joins the first existing line of its page whose
/// representative y is within `fragment.height * 0.5` (first-match-wins,
/// not closest-match; ties go to the earlier line). Assignment is
/// order-sensitive and must stay sequential. Afterwards each line's
/// fragments are sorted ascending by x and each page's lines descending by
/// y (the PDF y-axis grows upward), then pages are concatenated in order.
pub fn group_into_lines(fragments: Vec<TextFragment>) -> Vec<Line> {
    if fragments.is_empty() {
        return Vec::new();
    }

    let mut pages: Vec<u32> = fragments.iter().map(|f| f.page).collect();
    pages.sort();
    pages.dedup();

    let mut all_lines = Vec::new();

    for page in pages {
        let mut lines: Vec<Line> = Vec::new();

        for fragment in fragments.iter().filter(|f| f.page == page) {
            if fragment.text.trim().is_empty() {
                continue;
            }

            let tolerance = fragment.height * 0.5;
            let matched = lines.iter_mut().find(|l| (l.y - fragment.y).abs() < tolerance);

            match matched {
                Some(line) => line.fragments.push(fragment.clone()),
                None => lines.push(Line {
                    y: fragment.y,
                    page,
                    fragments: vec![fragment.clone()],
                }),
            }
        }

        for line in &mut lines {
            line.fragments
                .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
        }

        // Descending y = top-to-bottom reading order
        lines.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));

        all_lines.extend(lines);
    }

    all_lines
}
