//! # Leaderboard formatting
//!
//! Builds the Discord markdown lines for a posted leaderboard. Each returned
//! string is one fragment for [`crate::chunk::chunk_text`]; a fragment may hold
//! an embedded newline (heading plus its mentions) so the two never land in
//! separate messages.
//!
//! The chunker never splits a fragment, so a large tie group wraps its mentions
//! over several fragments of at most [`MENTION_LINE_LIMIT`] characters. The
//! heading stays with the first of them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
    discord::{TimestampStyle, bold, inline_code, italic, timestamp, underline, user_mention},
    models::UserTotal,
    ranking::assign_ranks,
};

/// Podium headings, best first. Ties share a heading.
pub const HEADINGS: [&str; 3] = ["# 🥇", "## 🥈", "### 🥉"];

pub const OTHER_HEADING: &str = "🏅 Other";

/// Longest run of comma separated mentions in one fragment.
pub const MENTION_LINE_LIMIT: usize = 1_800;

pub const TIE_NOTE: &str = "ℹ️ Note: Users with the same leggy count are listed in no particular order.";

pub struct LeaderboardInput<'a> {
    /// Sorted by total, highest first.
    pub totals: &'a [UserTotal],
    /// Leggies per user registered since the previous board update.
    pub added_since_update: &'a HashMap<String, u64>,
    pub total_leggies: u64,
    pub generated_at: DateTime<Utc>,
}

impl LeaderboardInput<'_> {
    pub fn added_total(&self) -> u64 {
        self.added_since_update.values().sum()
    }
}

struct TieGroup<'a> {
    total: u64,
    users: Vec<&'a UserTotal>,
}

fn tie_groups(totals: &[UserTotal]) -> Vec<TieGroup<'_>> {
    let mut groups: Vec<TieGroup<'_>> = Vec::new();
    let mut current_rank = 0;

    for ranked in assign_ranks(totals) {
        if ranked.rank != current_rank {
            current_rank = ranked.rank;
            groups.push(TieGroup {
                total: ranked.entry.total,
                users: Vec::new(),
            });
        }

        if let Some(group) = groups.last_mut() {
            group.users.push(ranked.entry);
        }
    }

    groups
}

fn mention(user: &UserTotal, added: &HashMap<String, u64>) -> String {
    let mention = user_mention(&user.user_id);

    match added.get(&user.user_id) {
        Some(&count) if count > 0 => format!("{mention} ({})", bold(&format!("🔺{count}"))),
        _ => mention,
    }
}

/// Comma separated mentions, wrapped so no line passes `limit` characters.
fn mention_lines(users: &[&UserTotal], added: &HashMap<String, u64>, limit: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;

    for user in users {
        let text = mention(user, added);
        let len = text.chars().count();

        if line_len > 0 && line_len + 2 + len > limit {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }

        if line_len > 0 {
            line.push_str(", ");
            line_len += 2;
        }
        line.push_str(&text);
        line_len += len;
    }

    if line_len > 0 {
        lines.push(line);
    }

    lines
}

/// First fragment gets `prefix`, the rest follow as bare mention lines.
fn push_group(lines: &mut Vec<String>, prefix: String, mentions: Vec<String>) {
    let mut mentions = mentions.into_iter();

    lines.push(format!("{prefix}{}", mentions.next().unwrap_or_default()));
    lines.extend(mentions);
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    grouped
}

pub fn format_leaderboard(input: &LeaderboardInput<'_>) -> Vec<String> {
    let now = input.generated_at.timestamp();
    let mut lines = vec![
        format!(
            "Last updated on {} ({})",
            timestamp(now, TimestampStyle::LongDate),
            timestamp(now, TimestampStyle::Relative)
        ),
        format!(
            "Total Leggies: {}",
            bold(&italic(&inline_code(&group_thousands(input.total_leggies))))
        ),
        format!(
            "Leggies added since last update: {}",
            bold(&italic(&inline_code(&group_thousands(input.added_total()))))
        ),
    ];

    let groups = tie_groups(input.totals);

    for (heading, group) in HEADINGS.iter().zip(&groups) {
        push_group(
            &mut lines,
            format!("{heading} {} Leggies\n", inline_code(&group_thousands(group.total))),
            mention_lines(&group.users, input.added_since_update, MENTION_LINE_LIMIT),
        );
    }

    if groups.len() > HEADINGS.len() {
        lines.push(OTHER_HEADING.to_string());

        for group in &groups[HEADINGS.len()..] {
            push_group(
                &mut lines,
                format!("{}. ", bold(&underline(&group.total.to_string()))),
                mention_lines(&group.users, input.added_since_update, MENTION_LINE_LIMIT),
            );
        }
    }

    lines.push(italic(&format!("\n{TIE_NOTE}")));

    lines
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn totals(pairs: &[(&str, u64)]) -> Vec<UserTotal> {
        pairs
            .iter()
            .map(|(user_id, total)| UserTotal {
                user_id: user_id.to_string(),
                total: *total,
            })
            .collect()
    }

    fn input<'a>(
        totals: &'a [UserTotal],
        added: &'a HashMap<String, u64>,
        total_leggies: u64,
    ) -> LeaderboardInput<'a> {
        LeaderboardInput {
            totals,
            added_since_update: added,
            total_leggies,
            generated_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn test_full_board() {
        let totals = totals(&[
            ("1", 1_200),
            ("2", 1_200),
            ("3", 9),
            ("4", 5),
            ("5", 2),
            ("6", 2),
            ("7", 1),
        ]);
        let added = HashMap::from([("2".to_string(), 3), ("5".to_string(), 1)]);

        let lines = format_leaderboard(&input(&totals, &added, 2_419));

        assert_eq!(
            lines,
            vec![
                "Last updated on <t:1700000000:D> (<t:1700000000:R>)".to_string(),
                "Total Leggies: **_`2,419`_**".to_string(),
                "Leggies added since last update: **_`4`_**".to_string(),
                "# 🥇 `1,200` Leggies\n<@1>, <@2> (**🔺3**)".to_string(),
                "## 🥈 `9` Leggies\n<@3>".to_string(),
                "### 🥉 `5` Leggies\n<@4>".to_string(),
                "🏅 Other".to_string(),
                "**__2__**. <@5> (**🔺1**), <@6>".to_string(),
                "**__1__**. <@7>".to_string(),
                format!("_\n{TIE_NOTE}_"),
            ]
        );
    }

    #[test]
    fn test_fewer_groups_than_headings() {
        let totals = totals(&[("1", 4), ("2", 4)]);
        let added = HashMap::new();

        let lines = format_leaderboard(&input(&totals, &added, 8));

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[3], "# 🥇 `4` Leggies\n<@1>, <@2>");
        assert!(!lines.iter().any(|line| line == OTHER_HEADING));
    }

    #[test]
    fn test_empty_board() {
        let added = HashMap::new();
        let lines = format_leaderboard(&input(&[], &added, 0));

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "Total Leggies: **_`0`_**");
    }

    #[test]
    fn test_large_tie_group_wraps() {
        let ids: Vec<String> = (0..300).map(|i| format!("{}", 100_000_000_000_000_000u64 + i)).collect();
        let mut pairs: Vec<(&str, u64)> = vec![("1", 9), ("2", 8), ("3", 7)];
        pairs.extend(ids.iter().map(|id| (id.as_str(), 1)));
        let totals = totals(&pairs);
        let added = HashMap::new();

        let lines = format_leaderboard(&input(&totals, &added, 324));

        let other = lines.iter().position(|line| line == OTHER_HEADING).unwrap();
        let group = &lines[other + 1..lines.len() - 1];
        assert!(group.len() > 1);
        assert!(group[0].starts_with("**__1__**. <@"));
        assert!(group[1..].iter().all(|line| line.starts_with("<@")));
        assert!(group.iter().all(|line| line.chars().count() <= MENTION_LINE_LIMIT + 12));

        let mentioned: usize = group.iter().map(|line| line.matches("<@").count()).sum();
        assert_eq!(mentioned, 300);
    }

    #[test]
    fn test_mention_lines_respect_limit() {
        let users: Vec<UserTotal> = totals(&[("11", 1), ("22", 1), ("33", 1)]);
        let refs: Vec<&UserTotal> = users.iter().collect();
        let added = HashMap::new();

        // each mention is 5 characters, two of them joined are 12
        assert_eq!(
            mention_lines(&refs, &added, 12),
            vec!["<@11>, <@22>".to_string(), "<@33>".to_string()]
        );
        assert_eq!(mention_lines(&refs, &added, 11).len(), 3);
        assert_eq!(mention_lines(&refs, &added, 1).len(), 3);
    }

    #[test]
    fn test_zero_added_has_no_marker() {
        let totals = totals(&[("1", 3)]);
        let added = HashMap::from([("1".to_string(), 0)]);

        let lines = format_leaderboard(&input(&totals, &added, 3));
        assert_eq!(lines[3], "# 🥇 `3` Leggies\n<@1>");
    }
}
