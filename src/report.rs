//! Buckets pull requests and branch comparisons and renders them as a chat
//! report.

use std::collections::{BTreeMap, HashMap};

use crate::{
    config::{Config, LabelConfig},
    markup::{Emoji, Markup, SlackMarkup, TeamsMarkup},
    types::{BranchComparison, Bucket, PullRequest, PullRequests},
};

/// Prefixes at or below this length are never tried by the fuzzy match.
const MIN_MATCH_PREFIX: usize = 3;

/// Returns true when `login` looks like it belongs to `username`.
///
/// Chat and GitHub usernames often differ slightly, so the username is
/// shortened one character at a time from the right and the login only has
/// to start with one of those prefixes. Prefixes of three characters or
/// fewer are not tried.
pub fn assignee_matches(login: &str, username: &str) -> bool {
    let login = login.to_lowercase();
    let mut prefix: Vec<char> = username.to_lowercase().chars().collect();

    while prefix.len() > MIN_MATCH_PREFIX {
        let candidate: String = prefix.iter().collect();
        if login.starts_with(&candidate) {
            return true;
        }
        prefix.pop();
    }

    false
}

/// Pull requests sorted into status buckets.
#[derive(Debug, Default)]
pub struct Buckets<'a> {
    pub blocked: Vec<&'a PullRequest>,
    pub needs_review: Vec<&'a PullRequest>,
    pub in_progress: Vec<&'a PullRequest>,
}

impl Buckets<'_> {
    pub fn total(&self) -> usize {
        self.blocked.len() + self.needs_review.len() + self.in_progress.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Renders reports with a label policy and a markup dialect chosen once at
/// startup.
pub struct ReportBuilder {
    labels: LabelConfig,
    markup: Box<dyn Markup>,
}

impl ReportBuilder {
    pub fn new(labels: LabelConfig, markup: Box<dyn Markup>) -> Self {
        Self { labels, markup }
    }

    /// Picks Teams markup when a Teams webhook is configured, Slack otherwise.
    pub fn for_config(config: &Config) -> Self {
        let markup: Box<dyn Markup> = if config.formats_for_teams() {
            Box::new(TeamsMarkup)
        } else {
            Box::new(SlackMarkup)
        };
        Self::new(config.labels.clone(), markup)
    }

    pub fn markup(&self) -> &dyn Markup {
        self.markup.as_ref()
    }

    /// Drops pull requests carrying any excluded label.
    pub fn without_excluded<'a>(
        &self,
        prs: impl IntoIterator<Item = &'a PullRequest>,
    ) -> Vec<&'a PullRequest> {
        prs.into_iter()
            .filter(|pr| !pr.labels.iter().any(|l| self.labels.is_excluded(l)))
            .collect()
    }

    /// Pull requests eligible for bucketing: not excluded and, when a scope
    /// user is given, assigned to that user.
    pub fn whitelist<'a>(
        &self,
        prs: &'a [PullRequest],
        scope_user: Option<&str>,
    ) -> Vec<&'a PullRequest> {
        self.without_excluded(prs)
            .into_iter()
            .filter(|pr| match scope_user {
                Some(user) => pr.assignees.iter().any(|a| assignee_matches(a, user)),
                None => true,
            })
            .collect()
    }

    pub fn bucket_of(&self, pr: &PullRequest) -> Bucket {
        let has = |label: &Option<String>| label.as_deref().is_some_and(|l| pr.has_label(l));

        if has(&self.labels.blocked) {
            Bucket::Blocked
        } else if has(&self.labels.wip) {
            Bucket::InProgress
        } else {
            Bucket::NeedsReview
        }
    }

    pub fn bucketize<'a>(&self, prs: &[&'a PullRequest]) -> Buckets<'a> {
        let mut buckets = Buckets::default();
        for &pr in prs {
            match self.bucket_of(pr) {
                Bucket::Blocked => buckets.blocked.push(pr),
                Bucket::InProgress => buckets.in_progress.push(pr),
                Bucket::NeedsReview => buckets.needs_review.push(pr),
            }
        }
        buckets
    }

    /// Builds the report text.
    ///
    /// Branch comparisons that are ahead of their base take precedence: when
    /// any exist the pull request sections are replaced by the branch list.
    pub fn build(
        &self,
        pull_requests: &PullRequests,
        branches: &[BranchComparison],
        scope_user: Option<&str>,
    ) -> String {
        let m = self.markup();

        let prs = match pull_requests {
            PullRequests::Fetched(prs) => prs,
            PullRequests::Unavailable => {
                return format!(
                    "{} Could not fetch pull requests.",
                    m.emoji(Emoji::RotatingLight)
                );
            }
        };

        let mut branches: Vec<&BranchComparison> =
            branches.iter().filter(|b| b.ahead_by > 0).collect();
        branches.sort_by(|a, b| a.repo.cmp(&b.repo).then_with(|| a.branch.cmp(&b.branch)));

        let whitelisted = self.whitelist(prs, scope_user);
        let buckets = self.bucketize(&whitelisted);

        if buckets.is_empty() && branches.is_empty() {
            let wording = if scope_user.is_some() {
                "need your attention!"
            } else {
                "are waiting for review!"
            };
            return format!(
                "{} No branches or pull requests {} {}",
                m.emoji(Emoji::Zero),
                wording,
                m.emoji(Emoji::Tada)
            );
        }

        let lines = if branches.is_empty() {
            self.pull_request_lines(&whitelisted, &buckets, scope_user.is_some())
        } else {
            self.branch_lines(&branches)
        };

        lines.join(m.line_break())
    }

    fn pull_request_lines(
        &self,
        whitelisted: &[&PullRequest],
        buckets: &Buckets<'_>,
        scoped: bool,
    ) -> Vec<String> {
        let m = self.markup();
        let mut lines = Vec::new();

        if scoped {
            lines.push(m.bold(&format!("{} PR(s) need your attention", buckets.total())));
        }

        if !buckets.blocked.is_empty() {
            let mut section = vec![format!(
                "{} {} PRs are {}",
                m.emoji(Emoji::Warning),
                m.bold(&buckets.blocked.len().to_string()),
                m.bold("blocked")
            )];
            section.extend(self.lines_by_repo(&buckets.blocked));
            push_section(&mut lines, section);
        }

        if !buckets.needs_review.is_empty() {
            let mut section = vec![format!(
                "{} {} PRs need a review:",
                m.emoji(Emoji::Eyes),
                m.bold(&buckets.needs_review.len().to_string())
            )];
            section.extend(self.lines_by_repo(&buckets.needs_review));
            push_section(&mut lines, section);
        }

        if !buckets.in_progress.is_empty() {
            let mut section = vec![format!(
                "{} {} PRs are in-progress:",
                m.emoji(Emoji::ConstructionWorker),
                m.bold(&buckets.in_progress.len().to_string())
            )];
            section.extend(self.lines_by_repo(&buckets.in_progress));
            push_section(&mut lines, section);
        }

        if !scoped {
            let mut section = vec![m.bold("PRs assigned per user:")];
            section.extend(
                self.assignee_tally(whitelisted)
                    .into_iter()
                    .map(|(assignee, count)| format!("{assignee}: {count}")),
            );
            push_section(&mut lines, section);
        }

        lines
    }

    fn branch_lines(&self, branches: &[&BranchComparison]) -> Vec<String> {
        let m = self.markup();
        let mut lines = vec![format!(
            "{} {} branch(es) are ahead of the base branch",
            m.emoji(Emoji::Chains),
            m.bold(&branches.len().to_string())
        )];

        let mut current_repo: Option<&str> = None;
        for branch in branches {
            if current_repo != Some(branch.repo.as_str()) {
                lines.push(m.bold(&branch.repo));
                current_repo = Some(&branch.repo);
            }
            lines.push(format!(
                "‣ {}: {} commit(s) ahead of {}",
                m.link(&branch.branch, &branch.tree_url()),
                branch.ahead_by,
                branch.base_branch
            ));
        }

        lines
    }

    /// Groups pull requests under a bold repository header, repositories in
    /// alphabetical order and lines sorted by their rendered text.
    fn lines_by_repo(&self, prs: &[&PullRequest]) -> Vec<String> {
        let m = self.markup();
        let mut by_repo: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for pr in prs {
            by_repo
                .entry(pr.repo_name())
                .or_default()
                .push(self.pull_request_line(pr));
        }

        let mut lines = Vec::new();
        for (repo, mut pr_lines) in by_repo {
            lines.push(m.bold(repo));
            pr_lines.sort();
            lines.extend(pr_lines);
        }
        lines
    }

    fn pull_request_line(&self, pr: &PullRequest) -> String {
        let m = self.markup();
        let assignees = match pr.assignees.split_first() {
            None => m.emoji(Emoji::Shrug).to_string(),
            Some((first, [])) => m.bold(first),
            Some((first, rest)) => format!("{} +{}", m.bold(first), rest.len()),
        };
        format!(
            "‣ {} ☞ {} {}: {}",
            pr.author_login,
            assignees,
            m.link(&pr.number.to_string(), &pr.url),
            pr.title
        )
    }

    /// Counts whitelisted pull requests per assignee, highest count first.
    /// Ties keep the order in which assignees were first seen.
    pub fn assignee_tally(&self, whitelisted: &[&PullRequest]) -> Vec<(String, usize)> {
        let unassigned = format!("{} (unassigned)", self.markup().emoji(Emoji::Shrug));
        let mut tally: Vec<(String, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        let mut bump = |key: &str| {
            let i = *index.entry(key.to_string()).or_insert_with(|| {
                tally.push((key.to_string(), 0));
                tally.len() - 1
            });
            tally[i].1 += 1;
        };

        for pr in whitelisted {
            if pr.assignees.is_empty() {
                bump(unassigned.as_str());
            }
            for assignee in &pr.assignees {
                bump(assignee.as_str());
            }
        }

        tally.sort_by(|a, b| b.1.cmp(&a.1));
        tally
    }
}

fn push_section(lines: &mut Vec<String>, section: Vec<String>) {
    if section.is_empty() {
        return;
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.extend(section);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelConfig {
        LabelConfig {
            excluded: vec!["wontfix".to_string()],
            blocked: Some("blocked".to_string()),
            wip: Some("wip".to_string()),
        }
    }

    fn builder() -> ReportBuilder {
        ReportBuilder::new(labels(), Box::new(SlackMarkup))
    }

    fn pr(repo: &str, number: u64, author: &str, assignees: &[&str], labels: &[&str]) -> PullRequest {
        PullRequest {
            repository_url: format!("https://api.github.com/repos/{repo}"),
            number,
            title: format!("Change {number}"),
            url: format!("https://github.com/{repo}/pull/{number}"),
            author_login: author.to_string(),
            assignees: assignees.iter().map(|s| s.to_string()).collect(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn branch(repo: &str, name: &str, ahead_by: u64) -> BranchComparison {
        BranchComparison {
            repo: repo.to_string(),
            branch: name.to_string(),
            base_branch: "master".to_string(),
            ahead_by,
        }
    }

    #[test]
    fn test_assignee_matches_prefixes() {
        assert!(assignee_matches("johnsmith", "johnsmith"));
        assert!(assignee_matches("JohnSmith-gh", "johnsmith"));
        assert!(assignee_matches("johnny", "johnsmith"));
        assert!(assignee_matches("john", "johnsmith"));
        assert!(!assignee_matches("joh", "johnsmith"));
        assert!(!assignee_matches("jsmith", "johnsmith"));
    }

    #[test]
    fn test_assignee_matches_short_usernames_never_match() {
        assert!(!assignee_matches("bob", "bob"));
        assert!(!assignee_matches("bobby", "bob"));
        assert!(assignee_matches("bobby", "bobb"));
    }

    #[test]
    fn test_assignee_matches_counts_characters() {
        assert!(assignee_matches("zoëd-gh", "zoëdev"));
        assert!(!assignee_matches("zoë", "zoëdev"));
    }

    #[test]
    fn test_bucket_precedence() {
        let b = builder();
        assert_eq!(
            b.bucket_of(&pr("o/r", 1, "a", &[], &["wip", "blocked"])),
            Bucket::Blocked
        );
        assert_eq!(
            b.bucket_of(&pr("o/r", 2, "a", &[], &["wip"])),
            Bucket::InProgress
        );
        assert_eq!(
            b.bucket_of(&pr("o/r", 3, "a", &[], &["bug"])),
            Bucket::NeedsReview
        );
    }

    #[test]
    fn test_unset_labels_match_nothing() {
        let b = ReportBuilder::new(LabelConfig::default(), Box::new(SlackMarkup));
        assert_eq!(
            b.bucket_of(&pr("o/r", 1, "a", &[], &["blocked", "wip"])),
            Bucket::NeedsReview
        );
    }

    #[test]
    fn test_buckets_partition_whitelisted() {
        let b = builder();
        let prs = vec![
            pr("o/r", 1, "a", &[], &["blocked"]),
            pr("o/r", 2, "a", &[], &["wip"]),
            pr("o/r", 3, "a", &[], &[]),
            pr("o/r", 4, "a", &[], &["blocked", "wip"]),
            pr("o/r", 5, "a", &[], &["wontfix"]),
        ];
        let whitelisted = b.whitelist(&prs, None);
        let buckets = b.bucketize(&whitelisted);

        assert_eq!(whitelisted.len(), 4);
        assert_eq!(buckets.total(), whitelisted.len());
        let numbers = |v: &[&PullRequest]| v.iter().map(|p| p.number).collect::<Vec<_>>();
        assert_eq!(numbers(&buckets.blocked), vec![1, 4]);
        assert_eq!(numbers(&buckets.in_progress), vec![2]);
        assert_eq!(numbers(&buckets.needs_review), vec![3]);
    }

    #[test]
    fn test_exclusion_is_idempotent() {
        let b = builder();
        let prs = vec![
            pr("o/r", 1, "a", &[], &["wontfix"]),
            pr("o/r", 2, "a", &[], &["bug"]),
            pr("o/r", 3, "a", &[], &[]),
        ];
        let once = b.without_excluded(&prs);
        let twice = b.without_excluded(once.iter().copied());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_unavailable_short_circuits() {
        let b = builder();
        let branches = vec![branch("a/x", "f1", 3)];
        for scope in [None, Some("alice")] {
            assert_eq!(
                b.build(&PullRequests::Unavailable, &branches, scope),
                ":rotating_light: Could not fetch pull requests."
            );
        }
    }

    #[test]
    fn test_nothing_to_report() {
        let b = builder();
        assert_eq!(
            b.build(&PullRequests::empty(), &[], None),
            ":zero: No branches or pull requests are waiting for review! :tada:"
        );
        assert_eq!(
            b.build(&PullRequests::empty(), &[], Some("alice")),
            ":zero: No branches or pull requests need your attention! :tada:"
        );
    }

    #[test]
    fn test_only_excluded_or_stale_items_is_nothing_to_report() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![pr("o/r", 1, "a", &[], &["wontfix"])]);
        let branches = vec![branch("a/x", "f2", 0)];
        assert_eq!(
            b.build(&prs, &branches, None),
            ":zero: No branches or pull requests are waiting for review! :tada:"
        );
    }

    #[test]
    fn test_branch_report() {
        let b = builder();
        let branches = vec![
            branch("b/y", "g1", 1),
            branch("a/x", "f2", 0),
            branch("a/x", "f1", 3),
        ];
        let report = b.build(&PullRequests::empty(), &branches, None);

        assert_eq!(
            report,
            [
                ":chains: *2* branch(es) are ahead of the base branch",
                "*a/x*",
                "‣ <https://github.com/a/x/tree/f1|f1>: 3 commit(s) ahead of master",
                "*b/y*",
                "‣ <https://github.com/b/y/tree/g1|g1>: 1 commit(s) ahead of master",
            ]
            .join("\n")
        );
    }

    #[test]
    fn test_branches_replace_pull_request_sections() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![pr("o/r", 1, "a", &["alice"], &[])]);
        let report = b.build(&prs, &[branch("a/x", "f1", 2)], None);
        assert!(report.starts_with(":chains: *1* branch(es)"));
        assert!(!report.contains("need a review"));
        assert!(!report.contains("PRs assigned per user"));
    }

    #[test]
    fn test_unscoped_report() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![
            pr("octo/zeta", 7, "carol", &["alice"], &[]),
            pr("octo/alpha", 3, "bob", &["alice", "dave", "erin"], &["blocked"]),
            pr("octo/alpha", 2, "bob", &[], &[]),
            pr("octo/alpha", 9, "alice", &["bob"], &["wip"]),
        ]);

        let report = b.build(&prs, &[], None);
        let expected = [
            ":warning: *1* PRs are *blocked*",
            "*octo/alpha*",
            "‣ bob ☞ *alice* +2 <https://github.com/octo/alpha/pull/3|3>: Change 3",
            "",
            ":eyes: *2* PRs need a review:",
            "*octo/alpha*",
            "‣ bob ☞ :shrug: <https://github.com/octo/alpha/pull/2|2>: Change 2",
            "*octo/zeta*",
            "‣ carol ☞ *alice* <https://github.com/octo/zeta/pull/7|7>: Change 7",
            "",
            ":construction_worker: *1* PRs are in-progress:",
            "*octo/alpha*",
            "‣ alice ☞ *bob* <https://github.com/octo/alpha/pull/9|9>: Change 9",
            "",
            "*PRs assigned per user:*",
            "alice: 2",
            "dave: 1",
            "erin: 1",
            ":shrug: (unassigned): 1",
            "bob: 1",
        ]
        .join("\n");
        assert_eq!(report, expected);
    }

    #[test]
    fn test_scoped_report() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![
            pr("octo/alpha", 1, "bob", &["alice"], &[]),
            pr("octo/alpha", 2, "bob", &["bob"], &[]),
            pr("octo/alpha", 3, "bob", &["alfred"], &["wip"]),
        ]);

        let report = b.build(&prs, &[], Some("Alice"));
        let expected = [
            "*1 PR(s) need your attention*",
            "",
            ":eyes: *1* PRs need a review:",
            "*octo/alpha*",
            "‣ bob ☞ *alice* <https://github.com/octo/alpha/pull/1|1>: Change 1",
        ]
        .join("\n");
        assert_eq!(report, expected);
    }

    #[test]
    fn test_scope_with_no_matches_is_nothing_to_report() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![pr("o/r", 1, "a", &["bob"], &[])]);
        assert_eq!(
            b.build(&prs, &[], Some("alice")),
            ":zero: No branches or pull requests need your attention! :tada:"
        );
    }

    #[test]
    fn test_tally_descending() {
        let b = builder();
        let prs = vec![
            pr("o/r", 1, "x", &[], &[]),
            pr("o/r", 2, "x", &["alice"], &[]),
            pr("o/r", 3, "x", &["alice"], &[]),
        ];
        let whitelisted = b.whitelist(&prs, None);
        assert_eq!(
            b.assignee_tally(&whitelisted),
            vec![
                ("alice".to_string(), 2),
                (":shrug: (unassigned)".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_lines_within_repo_sorted_by_text() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![
            pr("o/r", 20, "zed", &[], &[]),
            pr("o/r", 10, "amy", &[], &[]),
        ]);
        let report = b.build(&prs, &[], None);
        let amy = report.find("‣ amy").unwrap();
        let zed = report.find("‣ zed").unwrap();
        assert!(amy < zed);
    }

    #[test]
    fn test_build_is_pure() {
        let b = builder();
        let prs = PullRequests::Fetched(vec![
            pr("o/r", 1, "a", &["alice"], &["blocked"]),
            pr("o/r", 2, "b", &[], &[]),
        ]);
        let branches = vec![branch("a/x", "f1", 0)];
        let first = b.build(&prs, &branches, None);
        for _ in 0..3 {
            assert_eq!(b.build(&prs, &branches, None), first);
        }
        assert_eq!(
            b.build(&prs, &branches, Some("alice")),
            b.build(&prs, &branches, Some("alice"))
        );
    }

    #[test]
    fn test_teams_dialect() {
        let b = ReportBuilder::new(labels(), Box::new(TeamsMarkup));
        let prs = PullRequests::Fetched(vec![pr("o/r", 5, "bob", &[], &[])]);
        let report = b.build(&prs, &[], None);
        assert_eq!(
            report,
            [
                "👀 <b>1</b> PRs need a review:",
                "<b>o/r</b>",
                "‣ bob ☞ 🤷 [5](https://github.com/o/r/pull/5): Change 5",
                "",
                "<b>PRs assigned per user:</b>",
                "🤷 (unassigned): 1",
            ]
            .join("<br/>")
        );
    }
}
