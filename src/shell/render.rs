use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Renders one list item from its data.
pub type RenderFn = Arc<dyn Fn(&JsonValue) -> String + Send + Sync>;

/// Item templates found while compiling the app, keyed by item name.
///
/// Each shell owns its registry, so independent shells never see each
/// other's items.
#[derive(Clone, Default)]
pub struct ItemRegistry {
    items: HashMap<String, RenderFn>,
}

impl ItemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the render function for `name`.
    pub fn register(&mut self, name: impl Into<String>, render: RenderFn) {
        self.items.insert(name.into(), render);
    }

    /// Renders the item `name` with `data`, if such an item was registered.
    #[must_use]
    pub fn render(&self, name: &str, data: &JsonValue) -> Option<String> {
        self.items.get(name).map(|render| render(data))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Debug for ItemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.keys()).finish()
    }
}

/// The client-side template engine (Handlebars or similar).
pub trait TemplateEngine: Send + Sync + 'static {
    /// Compiles `template` and renders it with `data`.
    ///
    /// Every `{{#for items itemName="item"}}` block must register its inner
    /// template in `registry` under the item name.
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not compile or render.
    fn render(
        &self,
        template: &str,
        data: &JsonValue,
        registry: &mut ItemRegistry,
    ) -> Result<String, Error>;
}

/// Menu with the "Reset data" and "View app data" buttons.
pub const DEMO_MENU_HTML: &str = r#"<div class="remake-menu">
    <button class="cool-button cool-button--secondary js-reset-data">Reset data</button>
    <button class="cool-button js-toggle-view">View app data</button>
  </div>"#;

static FOR_LOOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{#for\s+(\S+)\s+in\s+([^\}\s]+)").expect("valid for-loop pattern")
});

/// Rewrites `{{#for todo in todos` into `{{#for todos itemName="todo"`.
#[must_use]
pub fn expand_for_loops(template: &str) -> String {
    FOR_LOOP
        .replace_all(template, r#"{{#for $2 itemName="$1""#)
        .into_owned()
}

/// Renders the live app, with the demo menu injected as `demoMenu`.
///
/// The menu is prepended when the template does not place it itself.
///
/// # Errors
///
/// Propagates template engine failures.
pub fn render_app<E: TemplateEngine>(
    engine: &E,
    template: &str,
    document: &JsonValue,
    registry: &mut ItemRegistry,
) -> Result<String, Error> {
    let mut data = document.clone();
    if let JsonValue::Object(map) = &mut data {
        map.insert("demoMenu".into(), JsonValue::String(DEMO_MENU_HTML.into()));
    }

    let html = engine.render(&expand_for_loops(template), &data, registry)?;
    if html.contains("remake-menu") {
        Ok(html)
    } else {
        Ok(format!("{DEMO_MENU_HTML}{html}"))
    }
}

/// Renders the read-only, syntax-highlighted dump of `document`.
#[must_use]
pub fn render_data_view(document: &JsonValue) -> String {
    let menu = DEMO_MENU_HTML
        .replace("View app data", "Switch back to app")
        .replace("js-toggle-view", "js-toggle-view active");
    format!(
        r#"<div class="app-data">{menu}<h1>App Data</h1><div class="remake-json">{}</div></div>"#,
        highlight_json(document)
    )
}

/// Pretty-prints `document` as HTML, wrapping each string literal in a
/// `green-code` span.
#[must_use]
pub fn highlight_json(document: &JsonValue) -> String {
    let pretty = serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string());
    let mut out = String::with_capacity(pretty.len() * 2);
    let mut in_string = false;
    let mut escaped = false;

    for c in pretty.chars() {
        match c {
            '"' if !escaped => {
                if in_string {
                    out.push_str("\"</span>");
                } else {
                    out.push_str("<span class=\"green-code\">\"");
                }
                in_string = !in_string;
            }
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
        escaped = in_string && c == '\\' && !escaped;
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    /// Engine that renders `{{todo}}`-free output: the item names it saw and
    /// the document's top-level keys.
    pub(crate) struct EchoEngine {
        pub(crate) with_menu: bool,
    }

    impl TemplateEngine for EchoEngine {
        fn render(
            &self,
            template: &str,
            data: &JsonValue,
            registry: &mut ItemRegistry,
        ) -> Result<String, Error> {
            if let Some(caps) = Regex::new(r#"itemName="(\w+)""#).unwrap().captures(template) {
                let name = caps[1].to_owned();
                let tag = name.clone();
                registry.register(
                    name,
                    Arc::new(move |item: &JsonValue| format!("<li data-{tag}>{item}</li>")),
                );
            }
            let menu = if self.with_menu {
                data["demoMenu"].as_str().unwrap_or_default()
            } else {
                ""
            };
            Ok(format!("{menu}<main>{}</main>", data["todos"]))
        }
    }

    #[test]
    fn for_loops_are_expanded() {
        assert_eq!(
            expand_for_loops("<ul>{{#for todo in todos}}<li>{{todo.text}}</li>{{/for}}</ul>"),
            r#"<ul>{{#for todos itemName="todo"}}<li>{{todo.text}}</li>{{/for}}</ul>"#
        );
        assert_eq!(
            expand_for_loops("{{#for  a   in b}}{{#for c in d.e}}"),
            r#"{{#for b itemName="a"}}{{#for d.e itemName="c"}}"#
        );
    }

    #[test]
    fn menu_is_prepended_when_template_omits_it() {
        let mut registry = ItemRegistry::new();
        let html = render_app(
            &EchoEngine { with_menu: false },
            "{{#for todo in todos}}{{/for}}",
            &json!({"todos": []}),
            &mut registry,
        )
        .unwrap();
        assert!(html.starts_with(DEMO_MENU_HTML));
        assert!(registry.contains("todo"));
    }

    #[test]
    fn menu_is_not_duplicated() {
        let html = render_app(
            &EchoEngine { with_menu: true },
            "{{{demoMenu}}}",
            &json!({"todos": []}),
            &mut ItemRegistry::new(),
        )
        .unwrap();
        assert_eq!(html.matches("remake-menu").count(), 1);
    }

    #[test]
    fn registry_renders_items() {
        let mut registry = ItemRegistry::new();
        registry.register("todo", Arc::new(|_: &JsonValue| "<li></li>".to_owned()));
        assert_eq!(registry.render("todo", &json!({})).as_deref(), Some("<li></li>"));
        assert!(registry.render("missing", &json!({})).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn highlight_wraps_strings_and_escapes_html() {
        let html = highlight_json(&json!({"text": "a \"b\" <c>"}));
        assert_eq!(
            html,
            "{\n  <span class=\"green-code\">\"text\"</span>: <span class=\"green-code\">\"a \\\"b\\\" &lt;c&gt;\"</span>\n}"
        );
    }

    #[test]
    fn highlight_handles_trailing_backslash() {
        let html = highlight_json(&json!(["x\\", "y"]));
        assert_eq!(html.matches("<span").count(), 2);
        assert_eq!(html.matches("</span>").count(), 2);
    }

    #[test]
    fn data_view_toggles_menu() {
        let html = render_data_view(&json!({}));
        assert!(html.contains("Switch back to app"));
        assert!(html.contains("js-toggle-view active"));
        assert!(html.contains("<h1>App Data</h1>"));
    }
}
