//! Line-anchored substitution rules for the configuration templates.
//!
//! A rule pairs a pattern with a renderer. Rendering a template applies every
//! rule to every line: the span the pattern matches (the whole line for
//! `^KEY.*`, key-to-end-of-line for `listen.*`, just the literal for
//! `example\.com`) is replaced with the rendered value. Replacement text is
//! literal; `$` in a rendered value is never expanded. Lines no rule matches
//! are copied byte for byte.

use crate::derive::EnvParams;
use crate::settings::PathsSection;
use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

/// Values available to renderers.
pub struct RenderContext<'a> {
    pub params: &'a EnvParams,
    pub paths: &'a PathsSection,
}

impl RenderContext<'_> {
    fn home(&self) -> String {
        self.paths.home_dir(&self.params.user)
    }
}

/// One (pattern, renderer) pair.
pub struct LineRule {
    pattern: Regex,
    render: fn(&RenderContext<'_>) -> String,
}

impl LineRule {
    fn new(pattern: &str, render: fn(&RenderContext<'_>) -> String) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            render,
        }
    }
}

/// Rules for the gunicorn launcher script.
pub static RUN_SCRIPT_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule::new(r"^LOGFILE.*", |c| {
            format!("LOGFILE={}/{}", c.params.logdir, c.params.log_gunicorn)
        }),
        LineRule::new(r"^LOGLEVEL.*", |c| {
            format!("LOGLEVEL={}", c.params.gunicorn_loglevel)
        }),
        LineRule::new(r"^NUM_WORKERS.*", |c| {
            format!("NUM_WORKERS={}", c.params.gunicorn_num_workers)
        }),
        LineRule::new(r"^BIND_ADDRESS.*", |c| {
            format!("BIND_ADDRESS={}", c.params.bind_address())
        }),
        LineRule::new(r"^USER.*", |c| format!("USER={}", c.params.user)),
        LineRule::new(r"^GROUP.*", |c| format!("GROUP={}", c.params.user)),
        LineRule::new(r"^PROJECTDIR.*", |c| format!("PROJECTDIR={}", c.params.dir)),
        LineRule::new(r"^PROJECTENV.*", |c| {
            format!(
                "PROJECTENV={}/{}",
                c.paths.virtualenvs_dir(&c.params.user),
                c.params.name
            )
        }),
    ]
});

/// Rules for the Nginx site file.
pub static SITE_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule::new(r"listen.*", |c| {
            format!("listen {};", c.params.public_address())
        }),
        LineRule::new(r"proxy_pass http.*", |c| {
            format!("proxy_pass http://{}/;", c.params.bind_address())
        }),
        LineRule::new(r"example\.com", |c| c.params.domain.clone()),
        LineRule::new(r"root.*", |c| format!("root {};", c.params.dir)),
        LineRule::new(r"access_log.*", |c| {
            format!(
                "access_log {}/{};",
                c.params.logdir, c.params.log_nginx_access
            )
        }),
        LineRule::new(r"error_log.*", |c| {
            format!("error_log {}/{};", c.params.logdir, c.params.log_nginx_error)
        }),
    ]
});

/// Rules for the Upstart job file.
pub static JOB_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule::new(r"^description.*", |c| {
            format!("description \"{}\"", c.params.descriptive_name)
        }),
        LineRule::new(r"^exec.*", |c| {
            format!("exec {}/{}", c.home(), c.params.script_name)
        }),
    ]
});

/// nginx.conf edits applied before installing sites: raise the hash sizes
/// Nginx needs for long server names.
pub static NGINX_TUNING: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"# types_hash_max_size.*").unwrap(),
            "types_hash_max_size 2048;",
        ),
        (
            Regex::new(r"# server_names_hash_bucket_size.*").unwrap(),
            "server_names_hash_bucket_size 64;",
        ),
    ]
});

/// Reverse of [`NGINX_TUNING`], used by `clean --clean-nginx`.
pub static NGINX_TUNING_REVERT: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"^(\s*)types_hash_max_size.*").unwrap(),
            "${1}# types_hash_max_size 2048;",
        ),
        (
            Regex::new(r"^(\s*)server_names_hash_bucket_size.*").unwrap(),
            "${1}# server_names_hash_bucket_size 64;",
        ),
    ]
});

/// Render a template with a rule list.
pub fn render(text: &str, rules: &[LineRule], ctx: &RenderContext<'_>) -> String {
    let rendered: Vec<(&Regex, String)> = rules
        .iter()
        .map(|rule| (&rule.pattern, (rule.render)(ctx)))
        .collect();
    substitute_lines(text, &rendered)
}

/// Apply fixed replacements, such as [`NGINX_TUNING`].
///
/// Unlike [`substitute_lines`], the replacement may refer to capture groups
/// (`${1}`).
pub fn apply_fixed(text: &str, replacements: &[(Regex, &'static str)]) -> String {
    map_lines(text, |body| {
        let mut current = Cow::Borrowed(body);
        for (pattern, template) in replacements {
            if pattern.is_match(&current) {
                current = Cow::Owned(pattern.replace_all(&current, *template).into_owned());
            }
        }
        current
    })
}

/// Apply each (pattern, replacement) pair, in order, to each line.
///
/// Line endings are preserved and never handed to the patterns.
pub fn substitute_lines(text: &str, replacements: &[(&Regex, String)]) -> String {
    map_lines(text, |body| {
        let mut current = Cow::Borrowed(body);
        for (pattern, replacement) in replacements {
            if pattern.is_match(&current) {
                current = Cow::Owned(
                    pattern
                        .replace_all(&current, NoExpand(replacement))
                        .into_owned(),
                );
            }
        }
        current
    })
}

fn map_lines(text: &str, rewrite: impl Fn(&str) -> Cow<'_, str>) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        out.push_str(&rewrite(body));
        out.push_str(ending);
    }
    out
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
