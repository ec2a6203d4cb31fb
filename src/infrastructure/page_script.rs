//! JavaScript side of the DevTools page driver.
//!
//! The page keeps a registry at `window.__chatExport` that hands out numeric
//! handles for elements and serializes subtrees into the snapshot wire
//! format. Every call installs the registry first if the page was reloaded.
//! The registry only holds weak references, so elements the page drops can
//! still be collected; entries for them are swept on every full snapshot.

use serde_json::Value;

/// Installs `window.__chatExport` unless it is already present.
const INSTALL_JS: &str = r#"
if (!window.__chatExport) {
  var ids = new WeakMap();
  var elements = new Map();
  var next = 0;
  var handleOf = function (el) {
    var id = ids.get(el);
    if (id === undefined) {
      id = ++next;
      ids.set(el, id);
    }
    if (!elements.has(id)) {
      elements.set(id, new WeakRef(el));
    }
    return id;
  };
  var get = function (id) {
    var ref = elements.get(id);
    var el = ref && ref.deref();
    if (!el || !el.isConnected) {
      elements.delete(id);
      throw new Error('element ' + id + ' is no longer in the page');
    }
    return el;
  };
  var sweep = function () {
    elements.forEach(function (ref, id) {
      var el = ref.deref();
      if (!el || !el.isConnected) elements.delete(id);
    });
  };
  var serialize = function (node) {
    if (node.nodeType === Node.TEXT_NODE) {
      return { type: 'text', text: node.nodeValue || '' };
    }
    if (node.nodeType !== Node.ELEMENT_NODE) {
      return null;
    }
    var attrs = [];
    for (var i = 0; i < node.attributes.length; i++) {
      var attr = node.attributes[i];
      var value = attr.value;
      if ((attr.name === 'href' || attr.name === 'src') && typeof node[attr.name] === 'string') {
        value = node[attr.name];
      }
      attrs.push([attr.name, value]);
    }
    var children = [];
    for (var j = 0; j < node.childNodes.length; j++) {
      var child = serialize(node.childNodes[j]);
      if (child) children.push(child);
    }
    return {
      type: 'element',
      tag: node.tagName.toLowerCase(),
      attrs: attrs,
      handle: handleOf(node),
      children: children
    };
  };
  window.__chatExport = {
    url: function () { return location.href; },
    queryAll: function (selector) {
      return Array.prototype.map.call(document.querySelectorAll(selector), handleOf);
    },
    document: function () {
      sweep();
      return serialize(document.documentElement);
    },
    snapshot: function (id) { return serialize(get(id)); },
    closest: function (id, selector) {
      var found = get(id).closest(selector);
      return found ? handleOf(found) : null;
    },
    click: function (id) { get(id).click(); return true; },
    scrollIntoView: function (id, block) {
      get(id).scrollIntoView({ behavior: 'instant', block: block });
      return true;
    },
    scrollTop: function (id) { return get(id).scrollTop; },
    setScrollTop: function (id, top) { get(id).scrollTop = top; return true; },
    pressKey: function (id, key) {
      get(id).dispatchEvent(new KeyboardEvent('keydown', { key: key, code: key, bubbles: true }));
      return true;
    }
  };
}
"#;

/// Registry methods callable from Rust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Url,
    QueryAll,
    Document,
    Snapshot,
    Closest,
    Click,
    ScrollIntoView,
    ScrollTop,
    SetScrollTop,
    PressKey,
}

impl Call {
    const fn method(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::QueryAll => "queryAll",
            Self::Document => "document",
            Self::Snapshot => "snapshot",
            Self::Closest => "closest",
            Self::Click => "click",
            Self::ScrollIntoView => "scrollIntoView",
            Self::ScrollTop => "scrollTop",
            Self::SetScrollTop => "setScrollTop",
            Self::PressKey => "pressKey",
        }
    }
}

/// Expression evaluating to the JSON-encoded result of `call(args)`.
#[must_use]
pub fn expression(call: Call, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "(function () {{{INSTALL_JS}return JSON.stringify(window.__chatExport.{}({args}));\n}})()",
        call.method()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expression_encodes_arguments_as_json() {
        let expr = expression(Call::QueryAll, &[json!(r#"[data-testid="user-message"]"#)]);
        assert!(expr.starts_with("(function () {"));
        assert!(expr.ends_with("})()"));
        assert!(expr.contains(
            r#"window.__chatExport.queryAll("[data-testid=\"user-message\"]")"#
        ));
    }

    #[test]
    fn test_expression_without_arguments() {
        let expr = expression(Call::Document, &[]);
        assert!(expr.contains("JSON.stringify(window.__chatExport.document())"));
    }

    #[test]
    fn test_registry_holds_elements_weakly() {
        assert!(INSTALL_JS.contains("elements.set(id, new WeakRef(el))"));
        assert!(!INSTALL_JS.contains("elements.set(id, el)"));
        let document_call = INSTALL_JS
            .split("document: function")
            .nth(1)
            .and_then(|rest| rest.split("},").next())
            .unwrap();
        assert!(document_call.contains("sweep();"));
    }

    #[test]
    fn test_closest_passes_selector() {
        let expr = expression(Call::Closest, &[json!(3), json!("div[data-test-render-count]")]);
        assert!(expr.contains(r#"window.__chatExport.closest(3, "div[data-test-render-count]")"#));
    }

    #[test]
    fn test_several_arguments() {
        let expr = expression(Call::ScrollIntoView, &[json!(7), json!("center")]);
        assert!(expr.contains(r#"scrollIntoView(7, "center")"#));
    }
}
