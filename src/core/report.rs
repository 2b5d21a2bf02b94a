// Scanner111 - core/report.rs
//
// Report rendering: turns a composed ReportFragment tree into Markdown,
// HTML, JSON, or plain text. Core layer: writes to strings; the CLI
// decides where the bytes go.

use crate::core::fragment::{compose, FragmentKind, ReportFragment};
use crate::core::model::{AnalysisResult, AnalysisStatus};
use crate::util::constants;
use colored::Colorize;

// =============================================================================
// Output format
// =============================================================================

/// Requested report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Html,
    Json,
    Text,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "html" => Some(Self::Html),
            "json" => Some(Self::Json),
            "text" | "txt" | "plain" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Rendering options shared by all formatters.
#[derive(Debug, Clone, Default)]
pub struct ComposerOptions {
    pub format: ReportFormat,
    /// ANSI colour on kind tags (Markdown only; off for files).
    pub color: bool,
    /// Number the top-level sections ("1. Plugins", "2. Form IDs", ...).
    pub number_sections: bool,
}

// =============================================================================
// Composer
// =============================================================================

/// Stateless façade over the formatters.
pub struct ReportComposer;

impl ReportComposer {
    /// Compose `fragments` into one tree and render it.
    pub fn compose_from_fragments(
        fragments: Vec<ReportFragment>,
        options: &ComposerOptions,
    ) -> String {
        let tree = compose(fragments);
        match options.format {
            ReportFormat::Markdown => render_markdown(&tree, options),
            ReportFormat::Html => render_html(&tree),
            ReportFormat::Json => render_json(&tree),
            ReportFormat::Text => render_text(&tree),
        }
    }

    /// Build the standard report tree for a set of analyzer results:
    /// a header, one fragment per successful analyzer, and an errors
    /// section whenever any analyzer failed (the rest still renders).
    pub fn fragments_from_results(results: &[AnalysisResult]) -> Vec<ReportFragment> {
        let mut fragments = vec![ReportFragment::Leaf {
            kind: FragmentKind::Header,
            title: Some(format!("{} Report", constants::APP_NAME)),
            order: i32::MIN,
            content: None,
        }];

        for result in results {
            if let Some(fragment) = &result.fragment {
                fragments.push(fragment.clone());
            }
        }

        let failures: Vec<&AnalysisResult> = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::FailedWithError)
            .collect();
        if !failures.is_empty() {
            let body = failures
                .iter()
                .map(|r| format!("{}: {}", r.analyzer_name, r.errors.join("; ")))
                .collect::<Vec<_>>()
                .join("\n");
            fragments.push(
                ReportFragment::section(
                    "Analyzer Errors",
                    vec![ReportFragment::text(FragmentKind::Error, body)],
                )
                .with_order(i32::MAX),
            );
        }

        fragments
    }
}

// =============================================================================
// Markdown
// =============================================================================

fn kind_icon(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Info => "ℹ",
        FragmentKind::Warning => "⚠",
        FragmentKind::Error => "✗",
        FragmentKind::Success => "✓",
        FragmentKind::Critical => "‼",
        FragmentKind::Fix => "🔧",
        FragmentKind::Notice => "📝",
        FragmentKind::Header | FragmentKind::Section | FragmentKind::Separator => "",
    }
}

fn kind_tag(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Info => "INFO",
        FragmentKind::Warning => "WARNING",
        FragmentKind::Error => "ERROR",
        FragmentKind::Success => "SUCCESS",
        FragmentKind::Critical => "CRITICAL",
        FragmentKind::Fix => "FIX",
        FragmentKind::Notice => "NOTICE",
        FragmentKind::Header | FragmentKind::Section | FragmentKind::Separator => "",
    }
}

fn coloured_tag(kind: FragmentKind, color: bool) -> String {
    let tag = format!("[{}]", kind_tag(kind));
    if !color {
        return tag;
    }
    match kind {
        FragmentKind::Critical => tag.bright_red().bold().to_string(),
        FragmentKind::Error => tag.red().to_string(),
        FragmentKind::Warning => tag.yellow().to_string(),
        FragmentKind::Success => tag.green().to_string(),
        FragmentKind::Info => tag.cyan().to_string(),
        FragmentKind::Notice => tag.blue().to_string(),
        FragmentKind::Fix => tag.magenta().to_string(),
        _ => tag,
    }
}

fn render_markdown(tree: &ReportFragment, options: &ComposerOptions) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut section_counter = 0usize;
    markdown_blocks(tree, options, &mut section_counter, &mut blocks);
    let mut out = blocks.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

fn markdown_blocks(
    fragment: &ReportFragment,
    options: &ComposerOptions,
    section_counter: &mut usize,
    blocks: &mut Vec<String>,
) {
    match fragment {
        ReportFragment::Empty => {}
        ReportFragment::Leaf {
            kind: FragmentKind::Header,
            title,
            ..
        } => {
            blocks.push(format!("# {}", title.as_deref().unwrap_or("")));
        }
        ReportFragment::Leaf {
            kind: FragmentKind::Separator,
            ..
        } => blocks.push("---".to_string()),
        ReportFragment::Leaf {
            kind,
            title,
            content,
            ..
        } => {
            let mut block = format!("{} {}", kind_icon(*kind), coloured_tag(*kind, options.color));
            if let Some(title) = title {
                block.push_str(&format!(" **{title}**"));
            }
            if let Some(content) = content.as_deref().filter(|c| !c.is_empty()) {
                block.push('\n');
                block.push_str(content);
            }
            blocks.push(block);
        }
        ReportFragment::Node { title, .. } => {
            if let Some(title) = title {
                *section_counter += 1;
                if options.number_sections {
                    blocks.push(format!("## {section_counter}. {title}"));
                } else {
                    blocks.push(format!("## {title}"));
                }
            }
            for child in fragment.sorted_children() {
                markdown_blocks(child, options, section_counter, blocks);
            }
        }
    }
}

// =============================================================================
// HTML
// =============================================================================

/// Class->colour mapping emitted once at the top of every HTML report.
const HTML_STYLE: &str = "\
<style>
  body { font-family: sans-serif; margin: 2em; }
  section { margin: 0.5em 0; padding: 0.4em 0.8em; border-left: 4px solid #ccc; }
  section.critical { border-color: #b30000; background: #ffe6e6; }
  section.error { border-color: #cc3300; background: #fff0eb; }
  section.warning { border-color: #cc9900; background: #fffbe6; }
  section.success { border-color: #2d882d; background: #eeffee; }
  section.info, section.notice { border-color: #3366cc; background: #eef4ff; }
  section.fix { border-color: #884488; background: #f9eeff; }
  section.header h1, section.section h2 { margin: 0.2em 0; }
  hr { border: none; border-top: 1px solid #ccc; }
</style>";

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_html(tree: &ReportFragment) -> String {
    let mut out = String::from(HTML_STYLE);
    out.push('\n');
    html_fragment(tree, &mut out);
    out
}

fn html_fragment(fragment: &ReportFragment, out: &mut String) {
    match fragment {
        ReportFragment::Empty => {}
        ReportFragment::Leaf {
            kind: FragmentKind::Separator,
            ..
        } => out.push_str("<hr/>\n"),
        ReportFragment::Leaf {
            kind,
            title,
            content,
            ..
        } => {
            out.push_str(&format!("<section class=\"{}\">", kind.name()));
            if *kind == FragmentKind::Header {
                if let Some(title) = title {
                    out.push_str(&format!("<h1>{}</h1>", html_escape(title)));
                }
            } else if let Some(title) = title {
                out.push_str(&format!("<strong>{}</strong>", html_escape(title)));
            }
            if let Some(content) = content.as_deref().filter(|c| !c.is_empty()) {
                out.push_str(&format!("<pre>{}</pre>", html_escape(content)));
            }
            out.push_str("</section>\n");
        }
        ReportFragment::Node { title, .. } => {
            out.push_str("<section class=\"section\">");
            if let Some(title) = title {
                out.push_str(&format!("<h2>{}</h2>", html_escape(title)));
            }
            out.push('\n');
            for child in fragment.sorted_children() {
                html_fragment(child, out);
            }
            out.push_str("</section>\n");
        }
    }
}

// =============================================================================
// JSON
// =============================================================================

/// Recursive object with stable key order:
/// kind, title, order, content, severity, children.
fn render_json(tree: &ReportFragment) -> String {
    let value = json_value(tree);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}

fn json_value(fragment: &ReportFragment) -> serde_json::Value {
    use serde_json::{json, Map, Value};

    let mut obj = Map::new();
    match fragment {
        ReportFragment::Empty => {
            obj.insert("kind".to_string(), json!("empty"));
            obj.insert("title".to_string(), Value::Null);
            obj.insert("order".to_string(), json!(0));
            obj.insert("content".to_string(), Value::Null);
            obj.insert("severity".to_string(), json!("none"));
            obj.insert("children".to_string(), json!([]));
        }
        ReportFragment::Leaf {
            kind,
            title,
            order,
            content,
        } => {
            obj.insert("kind".to_string(), json!(kind.name()));
            obj.insert("title".to_string(), json!(title));
            obj.insert("order".to_string(), json!(order));
            obj.insert("content".to_string(), json!(content));
            obj.insert(
                "severity".to_string(),
                json!(fragment.severity().label().to_lowercase()),
            );
            obj.insert("children".to_string(), json!([]));
        }
        ReportFragment::Node { title, order, .. } => {
            obj.insert("kind".to_string(), json!("section"));
            obj.insert("title".to_string(), json!(title));
            obj.insert("order".to_string(), json!(order));
            obj.insert("content".to_string(), Value::Null);
            obj.insert(
                "severity".to_string(),
                json!(fragment.severity().label().to_lowercase()),
            );
            let children: Vec<Value> = fragment
                .sorted_children()
                .into_iter()
                .map(json_value)
                .collect();
            obj.insert("children".to_string(), Value::Array(children));
        }
    }
    Value::Object(obj)
}

// =============================================================================
// Plain text
// =============================================================================

fn text_tag(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Info | FragmentKind::Notice => "[INFO]",
        FragmentKind::Warning => "[WARN]",
        FragmentKind::Error => "[ERR]",
        FragmentKind::Success => "[OK]",
        FragmentKind::Critical => "[!!]",
        FragmentKind::Fix => "[FIX]",
        FragmentKind::Header | FragmentKind::Section | FragmentKind::Separator => "",
    }
}

fn render_text(tree: &ReportFragment) -> String {
    let mut out = String::new();
    text_fragment(tree, 0, &mut out);
    out
}

fn text_fragment(fragment: &ReportFragment, depth: usize, out: &mut String) {
    let indent = " ".repeat(depth * constants::TEXT_INDENT_WIDTH);
    match fragment {
        ReportFragment::Empty => {}
        ReportFragment::Leaf {
            kind: FragmentKind::Separator,
            ..
        } => {
            out.push_str(&indent);
            out.push_str("----------------------------------------\n");
        }
        ReportFragment::Leaf {
            kind: FragmentKind::Header,
            title,
            ..
        } => {
            let title = title.as_deref().unwrap_or("");
            out.push_str(&format!("{indent}{title}\n"));
            out.push_str(&format!("{indent}{}\n", "=".repeat(title.len())));
        }
        ReportFragment::Leaf {
            kind,
            title,
            content,
            ..
        } => {
            out.push_str(&indent);
            out.push_str(text_tag(*kind));
            if let Some(title) = title {
                out.push_str(&format!(" {title}"));
            }
            out.push('\n');
            if let Some(content) = content.as_deref().filter(|c| !c.is_empty()) {
                let inner = " ".repeat((depth + 1) * constants::TEXT_INDENT_WIDTH);
                for line in content.lines() {
                    out.push_str(&format!("{inner}{line}\n"));
                }
            }
        }
        ReportFragment::Node { title, .. } => {
            let child_depth = if let Some(title) = title {
                out.push_str(&format!("{indent}{title}\n"));
                depth + 1
            } else {
                depth
            };
            for child in fragment.sorted_children() {
                text_fragment(child, child_depth, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragment::ReportFragment as F;

    fn sample_fragments() -> Vec<ReportFragment> {
        vec![
            F::Leaf {
                kind: FragmentKind::Header,
                title: Some("Scanner111 Report".to_string()),
                order: 0,
                content: None,
            },
            F::section(
                "Plugins",
                vec![
                    F::warning("Suspect Plugin", "ScrapEverything.esp breaks precombines"),
                    F::success("Plugin Count", "150 full plugins"),
                ],
            ),
            F::separator(),
        ]
    }

    fn opts(format: ReportFormat) -> ComposerOptions {
        ComposerOptions {
            format,
            color: false,
            number_sections: false,
        }
    }

    #[test]
    fn test_markdown_rendering() {
        let md =
            ReportComposer::compose_from_fragments(sample_fragments(), &opts(ReportFormat::Markdown));
        assert!(md.contains("# Scanner111 Report"));
        assert!(md.contains("## Plugins"));
        assert!(md.contains("⚠ [WARNING] **Suspect Plugin**"));
        assert!(md.contains("✓ [SUCCESS] **Plugin Count**"));
        assert!(md.contains("\n---\n"));
        // Blocks are blank-line separated.
        assert!(md.contains("Report\n\n"));
    }

    #[test]
    fn test_markdown_section_numbering() {
        let fragments = vec![
            F::section("First", vec![F::info("a", "x")]),
            F::section("Second", vec![F::info("b", "y")]),
        ];
        let options = ComposerOptions {
            format: ReportFormat::Markdown,
            color: false,
            number_sections: true,
        };
        let md = ReportComposer::compose_from_fragments(fragments, &options);
        assert!(md.contains("## 1. First"));
        assert!(md.contains("## 2. Second"));
    }

    #[test]
    fn test_html_escapes_content_and_has_one_style_block() {
        let fragments = vec![F::error("Bad <file>", "path & \"quotes\"")];
        let html =
            ReportComposer::compose_from_fragments(fragments, &opts(ReportFormat::Html));
        assert_eq!(html.matches("<style>").count(), 1);
        assert!(html.contains("<section class=\"error\">"));
        assert!(html.contains("Bad &lt;file&gt;"));
        assert!(html.contains("path &amp; &quot;quotes&quot;"));
    }

    #[test]
    fn test_json_has_stable_key_order_and_severity() {
        let fragments = vec![F::critical("Crash", "stack overflow")];
        let json =
            ReportComposer::compose_from_fragments(fragments, &opts(ReportFormat::Json));
        // Keys appear in declaration order.
        let kind_pos = json.find("\"kind\"").unwrap();
        let title_pos = json.find("\"title\"").unwrap();
        let severity_pos = json.find("\"severity\"").unwrap();
        let children_pos = json.find("\"children\"").unwrap();
        assert!(kind_pos < title_pos && title_pos < severity_pos && severity_pos < children_pos);
        assert!(json.contains("\"severity\": \"critical\""));
    }

    #[test]
    fn test_text_uses_ascii_tags_and_indentation() {
        let text =
            ReportComposer::compose_from_fragments(sample_fragments(), &opts(ReportFormat::Text));
        assert!(text.contains("[WARN] Suspect Plugin"));
        assert!(text.contains("[OK] Plugin Count"));
        // Children of the titled section are indented one level.
        assert!(text.contains("\n  [WARN]"));
        // Content sits one level below its leaf.
        assert!(text.contains("\n    ScrapEverything.esp breaks precombines"));
    }

    #[test]
    fn test_empty_input_renders_empty_report() {
        for format in [
            ReportFormat::Markdown,
            ReportFormat::Json,
            ReportFormat::Text,
        ] {
            let out = ReportComposer::compose_from_fragments(Vec::new(), &opts(format));
            // JSON renders the canonical empty object; the others nothing.
            if format == ReportFormat::Json {
                assert!(out.contains("\"kind\": \"empty\""));
            } else {
                assert!(out.trim().is_empty(), "{format:?} produced {out:?}");
            }
        }
    }

    #[test]
    fn test_fragments_from_results_adds_errors_section() {
        use crate::core::model::AnalysisResult;
        let results = vec![
            AnalysisResult::ok("plugins", F::info("Plugins", "all fine")),
            AnalysisResult::failed("form-ids", vec!["index out of range".to_string()]),
        ];
        let fragments = ReportComposer::fragments_from_results(&results);
        let md = ReportComposer::compose_from_fragments(fragments, &opts(ReportFormat::Markdown));
        assert!(md.contains("## Analyzer Errors"));
        assert!(md.contains("form-ids: index out of range"));
        // The successful analyzer still renders.
        assert!(md.contains("all fine"));
    }

    #[test]
    fn test_children_render_in_order_key_sequence() {
        let fragments = vec![F::section(
            "Ordered",
            vec![
                F::info("second", "b").with_order(2),
                F::info("first", "a").with_order(1),
            ],
        )];
        let md =
            ReportComposer::compose_from_fragments(fragments.clone(), &opts(ReportFormat::Markdown));
        let first = md.find("**first**").unwrap();
        let second = md.find("**second**").unwrap();
        assert!(first < second, "order keys must drive sibling order");

        let json = ReportComposer::compose_from_fragments(fragments, &opts(ReportFormat::Json));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["children"][0]["title"], "first");
        assert_eq!(parsed["children"][1]["title"], "second");
    }

    #[test]
    fn test_coloured_tags_only_when_requested() {
        let fragments = vec![F::critical("Crash", "bad")];
        let plain = ReportComposer::compose_from_fragments(
            fragments.clone(),
            &opts(ReportFormat::Markdown),
        );
        assert!(!plain.contains('\u{1b}'), "no ANSI codes without color");
        // With colour requested the tag text is still present either way
        // (colored may strip codes when no TTY is attached).
        let coloured = ReportComposer::compose_from_fragments(
            fragments,
            &ComposerOptions {
                format: ReportFormat::Markdown,
                color: true,
                number_sections: false,
            },
        );
        assert!(coloured.contains("CRITICAL"));
    }

    #[test]
    fn test_render_equivalence_of_identity_composition() {
        // compose(f, Empty) and f render byte-identically in every format.
        let f = F::warning("W", "watch");
        for format in [
            ReportFormat::Markdown,
            ReportFormat::Html,
            ReportFormat::Json,
            ReportFormat::Text,
        ] {
            let plain =
                ReportComposer::compose_from_fragments(vec![f.clone()], &opts(format));
            let composed = ReportComposer::compose_from_fragments(
                vec![f.clone(), ReportFragment::Empty],
                &opts(format),
            );
            assert_eq!(plain, composed, "{format:?} identity mismatch");
        }
    }
}
