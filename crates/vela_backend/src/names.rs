/// Identifier mangling for the class-shaped target.
///
/// Source names may contain characters the target rejects (`-`, `?`, `!`,
/// …); everything outside `[A-Za-z0-9_]` maps to `_`, a leading digit gets a
/// `_` prefix, and reserved words take a `v_` prefix. `$` never appears in a
/// mangled name, so compiler-generated members (`ran$`, closure class
/// segments) can never collide with user bindings.
pub(crate) fn mangle(name: &str) -> String {
    let mut out = sanitize(name);
    if out.is_empty() {
        out = "_".to_string();
    }
    if is_reserved(&out) {
        out = format!("v_{out}");
    }
    out
}

/// Class-name segment derived from a source name: mangled, with the first
/// letter upper-cased.
pub(crate) fn class_segment(name: &str) -> String {
    let mangled = mangle(name);
    let mut chars = mangled.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => mangled,
    }
}

fn sanitize(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        let ok = ch == '_' || ch.is_ascii_alphanumeric();
        if ok {
            if i == 0 && ch.is_ascii_digit() {
                out.push('_');
            }
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "abstract"
            | "assert"
            | "boolean"
            | "break"
            | "byte"
            | "case"
            | "catch"
            | "char"
            | "class"
            | "const"
            | "continue"
            | "default"
            | "do"
            | "double"
            | "else"
            | "enum"
            | "extends"
            | "final"
            | "finally"
            | "float"
            | "for"
            | "goto"
            | "if"
            | "implements"
            | "import"
            | "instanceof"
            | "int"
            | "interface"
            | "long"
            | "native"
            | "new"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "short"
            | "static"
            | "strictfp"
            | "super"
            | "switch"
            | "synchronized"
            | "this"
            | "throw"
            | "throws"
            | "transient"
            | "try"
            | "void"
            | "volatile"
            | "while"
            | "true"
            | "false"
            | "null"
            // Compiler-owned member names.
            | "INSTANCE"
    )
}
