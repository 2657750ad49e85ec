//! Template-syntax rewriting seam.
//!
//! Converting one templating dialect's variable syntax into another's is an
//! external concern. The engine only needs a pure `text -> text` function,
//! which any `Fn(&str) -> String` satisfies. [`DollarVariableRewriter`]
//! covers the common `{{${name}}}` attribute form when nothing richer is
//! plugged in.

use std::sync::LazyLock;

use regex::Regex;

/// Rewrites template-variable syntax in a piece of text.
pub trait TemplateRewriter: Send + Sync {
    fn rewrite(&self, text: &str) -> String;
}

impl<F> TemplateRewriter for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn rewrite(&self, text: &str) -> String {
        self(text)
    }
}

/// Leaves text untouched. Used when no rewriter is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRewriter;

impl TemplateRewriter for PassthroughRewriter {
    fn rewrite(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Rewrites `{{${name}}}` and `{{ $name }}` variables to `{{ name }}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DollarVariableRewriter;

impl TemplateRewriter for DollarVariableRewriter {
    fn rewrite(&self, text: &str) -> String {
        static DOLLAR_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\{\{\s*\$\{?([^{}]*?)\}?\s*\}\}").expect("valid regex")
        });

        DOLLAR_VAR_RE.replace_all(text, "{{ ${1} }}").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_keeps_text() {
        assert_eq!(PassthroughRewriter.rewrite("Hi {{${first_name}}}"), "Hi {{${first_name}}}");
    }

    #[test]
    fn dollar_variables_are_rewritten() {
        let rewriter = DollarVariableRewriter;
        assert_eq!(rewriter.rewrite("Hi {{${first_name}}}!"), "Hi {{ first_name }}!");
        assert_eq!(rewriter.rewrite("{{ $city }}"), "{{ city }}");
        assert_eq!(rewriter.rewrite("{% if x %}{{ plain }}{% endif %}"), "{% if x %}{{ plain }}{% endif %}");
    }

    #[test]
    fn closures_are_rewriters() {
        let upper = |s: &str| s.to_uppercase();
        let rewriter: &dyn TemplateRewriter = &upper;
        assert_eq!(rewriter.rewrite("abc"), "ABC");
    }
}
