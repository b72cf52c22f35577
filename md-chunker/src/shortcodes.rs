//! Templating shortcode cleanup (Hugo-style `{{< … >}}` / `{{% … %}}`).
//!
//! Rules run in a fixed order, specific before generic, so that meaningful
//! text (tooltip labels, code sample names) is kept before the catch-all
//! removes whatever is left.

use std::sync::LazyLock;

use regex::Regex;

struct Rule {
    re: Regex,
    replacement: &'static str,
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        // {{< glossary_tooltip text="containers" term_id="container" >}} → containers
        (
            r#"\{\{<\s*glossary_tooltip\s+text="([^"]+)"[^>]*>\}\}"#,
            "${1}",
        ),
        // {{< glossary_tooltip term_id="node" >}} → node
        (
            r#"\{\{<\s*glossary_tooltip\s+term_id="([^"]+)"[^>]*>\}\}"#,
            "${1}",
        ),
        // block wrappers: drop the markers, keep the body
        (r"\{\{[<%]\s*/?\s*note\s*[%>]\}\}", ""),
        (r"\{\{[<%]\s*/?\s*warning\s*[%>]\}\}", ""),
        (r"\{\{<\s*feature-state[^>]*>\}\}", ""),
        (
            r#"\{\{%\s*code_sample\s+file="([^"]+)"\s*%\}\}"#,
            "[code: ${1}]",
        ),
        (r#"\{\{<\s*relref\s+"[^"]*"\s*>\}\}"#, ""),
        (r"(?s)<!--.*?-->", ""),
        // anything left
        (r"\{\{[<%][^}]*[%>]\}\}", ""),
    ]
    .into_iter()
    .map(|(pattern, replacement)| Rule {
        re: Regex::new(pattern).expect("valid shortcode regex"),
        replacement,
    })
    .collect()
});

/// Replaces shortcodes with plain prose. Text outside shortcodes is untouched.
pub fn clean(content: &str) -> String {
    let mut out = content.to_string();
    for rule in RULES.iter() {
        if rule.re.is_match(&out) {
            out = rule.re.replace_all(&out, rule.replacement).into_owned();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tooltip_keeps_label() {
        let s = r#"Run {{< glossary_tooltip text="containers" term_id="container" >}} on a {{< glossary_tooltip term_id="node" >}}."#;
        assert_eq!(clean(s), "Run containers on a node.");
    }

    #[test]
    fn note_and_warning_keep_body() {
        let s = "{{< note >}}\nBe careful.\n{{< /note >}}\n{{% warning %}}Hot{{% /warning %}}";
        assert_eq!(clean(s), "\nBe careful.\n\nHot");
    }

    #[test]
    fn code_sample_becomes_placeholder() {
        let s = r#"See {{% code_sample file="pods/simple-pod.yaml" %}} here."#;
        assert_eq!(clean(s), "See [code: pods/simple-pod.yaml] here.");
    }

    #[test]
    fn comments_feature_state_and_leftovers_removed() {
        let s = "<!-- overview\nmulti -->A{{< feature-state for_k8s_version=\"v1.30\" state=\"stable\" >}}B{{< tabs name=\"x\" >}}C[link]({{< relref \"/docs/x\" >}})";
        assert_eq!(clean(s), "ABC[link]()");
    }

    #[test]
    fn plain_text_untouched() {
        let s = "# Title\n\nNo templates {here} at all.";
        assert_eq!(clean(s), s);
    }
}
