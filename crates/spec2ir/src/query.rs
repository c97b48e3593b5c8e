//! Element queries: the executable form of an IR [`Locator`].
//!
//! A query renders two ways: as a selector string for logs and errors
//! (`role=button[name="登录"]`, `xpath=//form`), and as a JavaScript
//! expression that evaluates to the first matching element or `null`.
//!
//! Role and label matching follow accessible-name rules closely enough for
//! form-driven pages: explicit `role`/`aria-*` attributes first, then the
//! implicit role of the tag and its associated `<label>`, placeholder or text.

use crate::ir::{Locator, LocatorKind};
use std::fmt;

/// Helpers shared by every rendered expression
const PRELUDE: &str = r"
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
const roleOf = (el) => {
  const explicit = el.getAttribute('role');
  if (explicit) return explicit.trim().split(/\s+/)[0];
  const tag = el.tagName.toLowerCase();
  const type = (el.getAttribute('type') || 'text').toLowerCase();
  switch (tag) {
    case 'button': return 'button';
    case 'a': case 'area': return el.hasAttribute('href') ? 'link' : null;
    case 'textarea': return 'textbox';
    case 'select': return el.multiple || el.size > 1 ? 'listbox' : 'combobox';
    case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
    case 'img': return 'img';
    case 'ul': case 'ol': return 'list';
    case 'li': return 'listitem';
    case 'nav': return 'navigation';
    case 'main': return 'main';
    case 'form': return 'form';
    case 'dialog': return 'dialog';
    case 'table': return 'table';
    case 'option': return 'option';
    case 'input':
      if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
      if (type === 'checkbox') return 'checkbox';
      if (type === 'radio') return 'radio';
      if (type === 'range') return 'slider';
      if (type === 'number') return 'spinbutton';
      if (type === 'search') return 'searchbox';
      if (type === 'hidden') return null;
      return 'textbox';
  }
  return null;
};
const labelOf = (el) => {
  const aria = el.getAttribute('aria-label');
  if (aria) return aria;
  const by = el.getAttribute('aria-labelledby');
  if (by) return by.split(/\s+/).map((id) => (document.getElementById(id) || {}).textContent || '').join(' ');
  if (el.labels && el.labels.length) return Array.from(el.labels).map((l) => l.textContent).join(' ');
  return '';
};
const nameOf = (el) => {
  const label = labelOf(el);
  if (label.trim()) return label;
  const tag = el.tagName.toLowerCase();
  if (tag === 'input' && ['button', 'submit', 'reset'].includes(el.type)) return el.value || '';
  if (tag === 'img') return el.getAttribute('alt') || '';
  const text = tag === 'input' || tag === 'textarea' || tag === 'select' ? '' : (el.innerText || el.textContent || '');
  if (text.trim()) return text;
  return el.getAttribute('title') || el.getAttribute('placeholder') || '';
};
const all = () => Array.from(document.querySelectorAll('body *'));
";

/// How to find one element on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Accessible role, optionally narrowed by accessible name
    Role {
        /// ARIA role
        role: String,
        /// Accessible name (case-insensitive substring)
        name: Option<String>,
    },
    /// Form control by its label text
    Label(String),
    /// Innermost element containing the text
    Text(String),
    /// `data-testid` attribute
    TestId(String),
    /// Raw CSS selector
    Css(String),
    /// Raw XPath expression
    XPath(String),
}

impl From<&Locator> for Query {
    fn from(locator: &Locator) -> Self {
        let value = locator.value.clone();
        match locator.kind {
            LocatorKind::Role => Self::Role {
                role: value,
                name: locator.name.clone(),
            },
            LocatorKind::Label => Self::Label(value),
            LocatorKind::Text => Self::Text(value),
            LocatorKind::TestId => Self::TestId(value),
            LocatorKind::Css => Self::Css(value),
            LocatorKind::XPath => Self::XPath(value),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role { role, name: Some(name) } => write!(f, "role={role}[name={name:?}]"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Label(label) => write!(f, "label={label}"),
            Self::Text(text) => write!(f, "text={text}"),
            Self::TestId(id) => write!(f, "[data-testid={id:?}]"),
            Self::Css(css) => f.write_str(css),
            Self::XPath(xpath) => write!(f, "xpath={xpath}"),
        }
    }
}

/// JSON string literal, which is also a valid JS string literal
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

impl Query {
    /// JS expression evaluating to the first matching element, or `null`
    #[must_use]
    pub fn to_js(&self) -> String {
        let body = match self {
            Self::Role { role, name } => {
                let name_check = name.as_ref().map_or_else(String::new, |n| {
                    format!(" && norm(nameOf(el)).includes(norm({}))", js_str(n))
                });
                format!(
                    "all().find((el) => roleOf(el) === {}{name_check}) || null",
                    js_str(role)
                )
            }
            Self::Label(label) => format!(
                "all().find((el) => labelOf(el).trim() && norm(labelOf(el)).includes(norm({}))) || null",
                js_str(label)
            ),
            Self::Text(text) => format!(
                "(() => {{ const t = norm({}); \
                 return all().find((el) => norm(el.textContent).includes(t) \
                 && !Array.from(el.children).some((c) => norm(c.textContent).includes(t))) || null; }})()",
                js_str(text)
            ),
            Self::TestId(id) => format!(
                "document.querySelector({})",
                js_str(&format!("[data-testid={}]", js_str(id)))
            ),
            Self::Css(css) => format!("document.querySelector({})", js_str(css)),
            Self::XPath(xpath) => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                js_str(xpath)
            ),
        };
        let mut js = String::from("(() => {");
        js.push_str(PRELUDE);
        js.push_str("return ");
        js.push_str(&body);
        js.push_str(";\n})()");
        js
    }

    /// JS expression that is `true` once a matching element is visible
    #[must_use]
    pub fn to_visible_js(&self) -> String {
        format!("(() => {{ const el = {}; return !!el && (el.offsetWidth > 0 || el.offsetHeight > 0 || el.getClientRects().length > 0); }})()", self.to_js())
    }

    /// JS expression that sets the element's value through the native setter
    /// and fires `input` and `change`, so framework-bound inputs see it.
    /// Evaluates to `false` when nothing matches.
    #[must_use]
    pub fn to_fill_js(&self, value: &str) -> String {
        let v = js_str(value);
        format!(
            "(() => {{ const el = {q}; if (!el) return false; el.focus(); \
             if (el.isContentEditable) {{ el.textContent = {v}; }} else {{ \
             const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype \
             : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype : HTMLInputElement.prototype; \
             const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
             if (desc && desc.set) desc.set.call(el, {v}); else el.value = {v}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            q = self.to_js()
        )
    }

    /// JS expression that scrolls the element into view and clicks it.
    /// Evaluates to `false` when nothing matches.
    #[must_use]
    pub fn to_click_js(&self) -> String {
        format!(
            "(() => {{ const el = {}; if (!el) return false; \
             el.scrollIntoView({{ block: 'center', inline: 'center' }}); el.click(); return true; }})()",
            self.to_js()
        )
    }
}

/// Renders visible role-bearing elements as an aria-snapshot outline.
///
/// Every entry is a JSON-quoted `role "name"` string, which is also a valid
/// YAML scalar; entries with children become mapping keys.
const ARIA_OUTLINE: &str = r"
const hidden = (el) => {
  if (el.getAttribute('aria-hidden') === 'true') return true;
  const style = window.getComputedStyle(el);
  return style.display === 'none' || style.visibility === 'hidden';
};
const collect = (el, depth) => {
  if (depth > 64 || hidden(el)) return [];
  const kids = Array.from(el.children).flatMap((c) => collect(c, depth + 1));
  const role = roleOf(el);
  if (!role) return kids;
  const name = (nameOf(el) || '').replace(/\s+/g, ' ').trim().replace(/\x22/g, '').slice(0, 120);
  return [{ entry: name ? role + ' \x22' + name + '\x22' : role, kids }];
};
const lines = [];
const render = (nodes, indent) => {
  for (const n of nodes) {
    lines.push(indent + '- ' + JSON.stringify(n.entry) + (n.kids.length ? ':' : ''));
    render(n.kids, indent + '  ');
  }
};
render(collect(document.body, 0), '');
return lines.join('\n');
";

/// JS expression returning the page's aria-snapshot outline as YAML text
#[must_use]
pub fn aria_outline_js() -> String {
    format!("(() => {{{PRELUDE}{ARIA_OUTLINE}}})()")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod render_tests {
        use super::*;

        #[test]
        fn test_role_with_name_display() {
            let q = Query::from(&Locator::role("button", "登录"));
            assert_eq!(q.to_string(), "role=button[name=\"登录\"]");
        }

        #[test]
        fn test_display_forms() {
            let cases = [
                (LocatorKind::Role, "textbox", "role=textbox"),
                (LocatorKind::Label, "密码", "label=密码"),
                (LocatorKind::Text, "Welcome", "text=Welcome"),
                (LocatorKind::TestId, "submit", "[data-testid=\"submit\"]"),
                (LocatorKind::Css, "#user", "#user"),
                (LocatorKind::XPath, "//form/input", "xpath=//form/input"),
            ];
            for (kind, value, expected) in cases {
                let q = Query::from(&Locator::new(kind, value));
                assert_eq!(q.to_string(), expected);
            }
        }

        #[test]
        fn test_name_ignored_outside_role() {
            let mut locator = Locator::new(LocatorKind::Css, "#a");
            locator.name = Some("ignored".to_string());
            assert_eq!(Query::from(&locator), Query::Css("#a".to_string()));
        }
    }

    mod js_tests {
        use super::*;

        #[test]
        fn test_js_embeds_escaped_literals() {
            let q = Query::Css("input[name=\"user\"]".to_string());
            let js = q.to_js();
            assert!(js.contains(r#"document.querySelector("input[name=\"user\"]")"#));
            assert!(js.starts_with("(() => {"));
            assert!(js.ends_with("})()"));
        }

        #[test]
        fn test_role_js_checks_name() {
            let js = Query::from(&Locator::role("textbox", "用户名")).to_js();
            assert!(js.contains("roleOf(el) === \"textbox\""));
            assert!(js.contains("norm(\"用户名\")"));
            let bare = Query::Role {
                role: "button".to_string(),
                name: None,
            }
            .to_js();
            assert!(!bare.contains("nameOf(el)).includes"));
        }

        #[test]
        fn test_xpath_and_testid_js() {
            assert!(Query::XPath("//a".to_string())
                .to_js()
                .contains("document.evaluate(\"//a\""));
            assert!(Query::TestId("go".to_string())
                .to_js()
                .contains(r#"document.querySelector("[data-testid=\"go\"]")"#));
        }

        #[test]
        fn test_visible_js_wraps_query() {
            let js = Query::Text("Welcome".to_string()).to_visible_js();
            assert!(js.contains("norm(\"Welcome\")"));
            assert!(js.contains("getClientRects"));
        }

        #[test]
        fn test_fill_js_escapes_value() {
            let js = Query::Label("密码".to_string()).to_fill_js("a\"b");
            assert!(js.contains(r#"desc.set.call(el, "a\"b")"#));
            assert!(js.contains("new Event('input'"));
            assert!(js.contains("norm(\"密码\")"));
        }

        #[test]
        fn test_click_js_scrolls_then_clicks() {
            let js = Query::Css("#go".to_string()).to_click_js();
            let scroll = js.find("scrollIntoView").unwrap();
            let click = js.find("el.click()").unwrap();
            assert!(scroll < click);
        }

        #[test]
        fn test_aria_outline_js_is_self_contained() {
            let js = aria_outline_js();
            assert!(js.starts_with("(() => {"));
            assert!(js.ends_with("})()"));
            assert!(js.contains("const roleOf"));
            assert!(js.contains("render(collect(document.body, 0), '')"));
        }
    }
}
