//! Line-oriented structural scanner for brace-delimited languages.
//!
//! This is not a parser. Comments and literals are blanked out, then the
//! text is split into "headers" (the code between two `;`, `{` or `}`
//! boundaries). Headers directly inside a namespace or type body are
//! classified as namespace, type, method or property declarations; every
//! other brace block is skipped as an opaque balanced region. Anything the
//! scanner does not understand simply yields no declaration.

/// What kind of declaration was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Type,
    Method {
        parameter_count: usize,
        is_static: bool,
    },
    Property,
}

/// A declaration together with its line range (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Simple name of the member or type.
    pub name: String,
    /// For types, their own fully-qualified name. For members, the
    /// fully-qualified name of the declaring type.
    pub class_name: String,
    pub start_line: u32,
    pub end_line: u32,
}

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record"];

/// Words that may end a header without naming a member (`static { }`
/// initializer blocks, accessor blocks, Kotlin `init { }` and friends).
const NON_MEMBER_WORDS: &[&str] = &[
    "static", "get", "set", "init", "add", "remove", "unsafe", "checked", "unchecked", "fixed",
    "lock", "else", "do", "try", "finally", "companion", "object", "constructor",
];

/// Words that look like calls but are statements or operators.
const NON_METHOD_WORDS: &[&str] = &[
    "if", "for", "foreach", "while", "switch", "catch", "using", "lock", "return", "new", "base",
    "this", "typeof", "nameof", "sizeof", "default", "when", "synchronized", "operator",
];

enum Scope {
    /// Namespace block, holding its fully-qualified name.
    Namespace(String),
    /// Type body: full name of the type and index of its declaration.
    Type { full_name: String, decl: usize },
    /// Member body whose end line belongs to a declaration.
    Member(usize),
    /// Any other balanced block.
    Opaque,
}

/// Source text with comments and literals blanked, one entry per char.
struct Cleaned {
    chars: Vec<char>,
    lines: Vec<u32>,
}

impl Cleaned {
    fn line_at(&self, idx: usize) -> u32 {
        self.lines
            .get(idx)
            .or_else(|| self.lines.last())
            .copied()
            .unwrap_or(1)
    }
}

/// Scan `text` and return every declaration it could classify, in source order.
pub fn scan_declarations(text: &str) -> Vec<Declaration> {
    let cleaned = clean(text);
    let chars = &cleaned.chars;

    let mut decls: Vec<Declaration> = Vec::new();
    let mut stack: Vec<Scope> = Vec::new();
    let mut file_namespace = String::new();
    let mut header_start: Option<usize> = None;
    let mut paren_depth = 0i32;

    for (i, &c) in chars.iter().enumerate() {
        let structural = matches!(
            stack.last(),
            None | Some(Scope::Namespace(_)) | Some(Scope::Type { .. })
        );

        if !structural {
            match c {
                '{' => stack.push(Scope::Opaque),
                '}' => {
                    if let Some(Scope::Member(decl)) = stack.pop() {
                        decls[decl].end_line = cleaned.line_at(i);
                    }
                }
                _ => {}
            }
            continue;
        }

        if c.is_whitespace() {
            continue;
        }
        let start = *header_start.get_or_insert(i);

        match c {
            '(' => paren_depth += 1,
            ')' => paren_depth = (paren_depth - 1).max(0),
            '{' => {
                let header = &chars[start..i];
                if paren_depth > 0 || has_top_level_assignment(header) {
                    // Initializer or lambda body: keep collecting the header.
                    stack.push(Scope::Opaque);
                    continue;
                }
                let ctx = Context::new(&stack, &file_namespace);
                let scope = open_block(&cleaned, start, i, &ctx, &mut file_namespace, &mut decls);
                stack.push(scope);
                header_start = None;
            }
            ';' if paren_depth == 0 => {
                let ctx = Context::new(&stack, &file_namespace);
                finish_statement(&cleaned, start, i, &ctx, &mut file_namespace, &mut decls);
                header_start = None;
            }
            '}' => {
                if let Some(Scope::Type { decl, .. }) = stack.pop() {
                    decls[decl].end_line = cleaned.line_at(i);
                }
                header_start = None;
                paren_depth = 0;
            }
            _ => {}
        }
    }

    // Unterminated blocks run to the end of the file.
    let last_line = cleaned.line_at(chars.len());
    for scope in stack {
        if let Scope::Type { decl, .. } | Scope::Member(decl) = scope {
            decls[decl].end_line = last_line.max(decls[decl].start_line);
        }
    }

    decls
}

/// Where a header sits: the enclosing namespace and, if directly inside a
/// type body, that type's full name.
struct Context {
    namespace: String,
    enclosing_type: Option<String>,
}

impl Context {
    fn new(stack: &[Scope], file_namespace: &str) -> Self {
        let enclosing_type = match stack.last() {
            Some(Scope::Type { full_name, .. }) => Some(full_name.clone()),
            _ => None,
        };
        let namespace = stack
            .iter()
            .rev()
            .find_map(|s| match s {
                Scope::Namespace(name) => Some(name.clone()),
                _ => None,
            })
            .unwrap_or_else(|| file_namespace.to_string());
        Self {
            namespace,
            enclosing_type,
        }
    }

    fn qualify_type(&self, name: &str) -> String {
        match &self.enclosing_type {
            Some(outer) => format!("{}/{}", outer, name),
            None => qualify(&self.namespace, name),
        }
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Classify the header that ends at an opening brace and return the scope
/// for the block that follows.
fn open_block(
    cleaned: &Cleaned,
    start: usize,
    brace: usize,
    ctx: &Context,
    file_namespace: &mut String,
    decls: &mut Vec<Declaration>,
) -> Scope {
    let (offset, header) = strip_attributes(&cleaned.chars[start..brace]);
    let mut header: String = header.iter().collect();
    let mut decl_start = start + offset;

    if ctx.enclosing_type.is_none() {
        // Kotlin and Scala `package` lines have no terminating semicolon.
        if let Some(rest) = header.strip_prefix("package ") {
            let name: String = rest
                .chars()
                .take_while(|c| is_ident_char(*c) || *c == '.')
                .collect();
            *file_namespace = name.clone();
            let rest = rest[name.len()..].trim_start().to_string();
            decl_start = brace - rest.chars().count().min(brace - start);
            header = rest;
        }
    }

    let header_words = words(&header);
    let line = cleaned.line_at(decl_start);

    if ctx.enclosing_type.is_none()
        && header_words.first().map(String::as_str) == Some("namespace")
    {
        let name: String = after_keyword(&header, "namespace")
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        return Scope::Namespace(qualify(&ctx.namespace, &name));
    }

    if let Some(name) = type_name(&header) {
        let full_name = ctx.qualify_type(&name);
        decls.push(Declaration {
            kind: DeclarationKind::Type,
            name,
            class_name: full_name.clone(),
            start_line: line,
            end_line: line,
        });
        return Scope::Type {
            full_name,
            decl: decls.len() - 1,
        };
    }

    let Some(class_name) = &ctx.enclosing_type else {
        return Scope::Opaque;
    };

    let member = if header.contains('(') {
        method_declaration(&header, &header_words)
    } else {
        property_name(&header).map(|name| (name, DeclarationKind::Property))
    };

    match member {
        Some((name, kind)) => {
            decls.push(Declaration {
                kind,
                name,
                class_name: class_name.clone(),
                start_line: line,
                end_line: line,
            });
            Scope::Member(decls.len() - 1)
        }
        None => Scope::Opaque,
    }
}

/// Classify a header terminated by `;`: expression-bodied members,
/// bodiless methods, body-less records and file-scoped namespaces.
fn finish_statement(
    cleaned: &Cleaned,
    start: usize,
    semicolon: usize,
    ctx: &Context,
    file_namespace: &mut String,
    decls: &mut Vec<Declaration>,
) {
    let (offset, header) = strip_attributes(&cleaned.chars[start..semicolon]);
    let header: String = header.iter().collect();
    let header_words = words(&header);
    let start_line = cleaned.line_at(start + offset);
    let end_line = cleaned.line_at(semicolon);

    let Some(class_name) = &ctx.enclosing_type else {
        match header_words.first().map(String::as_str) {
            Some("namespace") | Some("package") => {
                *file_namespace = after_keyword(&header, &header_words[0])
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
            }
            _ => {
                if let Some(name) = type_name(&header) {
                    push_bodiless_type(decls, ctx, name, start_line, end_line);
                }
            }
        }
        return;
    };

    if let Some(name) = type_name(&header) {
        push_bodiless_type(decls, ctx, name, start_line, end_line);
        return;
    }
    if header_words.iter().any(|w| w == "delegate") {
        return;
    }

    let member = if let Some(arrow) = find_top_level(&header, "=>") {
        let left = &header[..arrow];
        if has_top_level_assignment(&left.chars().collect::<Vec<_>>()) {
            // `Func<int, int> f = x => x;` is a field with a lambda.
            None
        } else if left.contains('(') {
            method_declaration(left, &words(left))
        } else {
            property_name(left).map(|name| (name, DeclarationKind::Property))
        }
    } else if !has_top_level_assignment(&header.chars().collect::<Vec<_>>())
        && header.trim_end().ends_with(')')
    {
        method_declaration(&header, &header_words)
    } else {
        None
    };

    if let Some((name, kind)) = member {
        decls.push(Declaration {
            kind,
            name,
            class_name: class_name.clone(),
            start_line,
            end_line,
        });
    }
}

fn push_bodiless_type(
    decls: &mut Vec<Declaration>,
    ctx: &Context,
    name: String,
    start_line: u32,
    end_line: u32,
) {
    let full_name = ctx.qualify_type(&name);
    decls.push(Declaration {
        kind: DeclarationKind::Type,
        name,
        class_name: full_name,
        start_line,
        end_line,
    });
}

/// Name of the type declared by `header`, if a type keyword occurs before
/// any parameter list or assignment.
fn type_name(header: &str) -> Option<String> {
    let cut = header
        .find(|c: char| c == '(' || c == '=')
        .unwrap_or(header.len());
    let words = words(&header[..cut]);
    let keyword = words
        .iter()
        .position(|w| TYPE_KEYWORDS.contains(&w.as_str()) || w == "@interface")?;
    words[keyword + 1..]
        .iter()
        .find(|w| !TYPE_KEYWORDS.contains(&w.as_str()))
        .map(|w| w.trim_start_matches('@').to_string())
}

/// Name, parameter count and static-ness of a method header.
fn method_declaration(header: &str, words: &[String]) -> Option<(String, DeclarationKind)> {
    let chars: Vec<char> = header.chars().collect();
    let open = chars.iter().position(|&c| c == '(')?;

    // Walk back over whitespace and generic arguments to the identifier.
    let mut end = open;
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if end > 0 && chars[end - 1] == '>' {
        let mut depth = 0;
        while end > 0 {
            end -= 1;
            match chars[end] {
                '>' => depth += 1,
                '<' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
        while end > 0 && chars[end - 1].is_whitespace() {
            end -= 1;
        }
    }
    let mut begin = end;
    while begin > 0 && is_ident_char(chars[begin - 1]) {
        begin -= 1;
    }
    let name: String = chars[begin..end].iter().collect();
    let name = name.trim_start_matches('@').to_string();

    if name.is_empty()
        || name.chars().next().is_some_and(|c| c.is_ascii_digit())
        || NON_METHOD_WORDS.contains(&name.as_str())
    {
        return None;
    }

    Some((
        name,
        DeclarationKind::Method {
            parameter_count: parameter_count(&chars[open..]),
            is_static: words.iter().any(|w| w == "static"),
        },
    ))
}

/// Count parameters of the balanced group starting at `group[0] == '('`.
fn parameter_count(group: &[char]) -> usize {
    let mut depth = 0i32;
    let mut commas = 0;
    let mut has_content = false;
    for &c in group {
        match c {
            '(' | '<' | '[' => depth += 1,
            ')' | '>' | ']' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            ',' if depth == 1 => commas += 1,
            c if depth >= 1 && !c.is_whitespace() => has_content = true,
            _ => {}
        }
    }
    if has_content {
        commas + 1
    } else {
        0
    }
}

/// The member name of a property header: its last identifier.
fn property_name(header: &str) -> Option<String> {
    let trimmed = header.trim_end();
    if !trimmed.chars().last().is_some_and(is_ident_char) {
        return None;
    }
    let name: String = trimmed
        .chars()
        .rev()
        .take_while(|c| is_ident_char(*c))
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let name = name.trim_start_matches('@').to_string();
    // A lone word (`static`, `init`, ...) is a block, not a member.
    if words(trimmed).len() < 2 || NON_MEMBER_WORDS.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

/// Skip leading `[Attribute(...)]` sections and `@Annotation(...)` uses.
/// Returns the offset of the first remaining char and the remaining slice.
fn strip_attributes(header: &[char]) -> (usize, &[char]) {
    let mut i = 0;
    loop {
        while i < header.len() && header[i].is_whitespace() {
            i += 1;
        }
        if i >= header.len() {
            break;
        }
        match header[i] {
            '[' => {
                let mut depth = 0;
                while i < header.len() {
                    match header[i] {
                        '[' => depth += 1,
                        ']' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
            }
            '@' if header.get(i + 1).is_some_and(|c| c.is_alphabetic()) => {
                let word: String = header[i + 1..]
                    .iter()
                    .take_while(|c| is_ident_char(**c))
                    .collect();
                if word == "interface" {
                    break;
                }
                i += 1;
                while i < header.len() && (is_ident_char(header[i]) || header[i] == '.') {
                    i += 1;
                }
                let mut j = i;
                while j < header.len() && header[j].is_whitespace() {
                    j += 1;
                }
                if header.get(j) == Some(&'(') {
                    let mut depth = 0;
                    i = j;
                    while i < header.len() {
                        match header[i] {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    i += 1;
                                    break;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                }
            }
            _ => break,
        }
    }
    let i = i.min(header.len());
    (i, &header[i..])
}

/// True if the header contains `=` or `=>` outside parentheses and brackets,
/// ignoring comparison operators.
fn has_top_level_assignment(header: &[char]) -> bool {
    let mut depth = 0i32;
    for (i, &c) in header.iter().enumerate() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            '=' if depth == 0 => {
                let prev = if i > 0 { header[i - 1] } else { ' ' };
                let next = header.get(i + 1).copied().unwrap_or(' ');
                if !matches!(prev, '=' | '!' | '<' | '>') && next != '=' {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Byte index of the first occurrence of `needle` outside parentheses.
fn find_top_level(header: &str, needle: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in header.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ if depth == 0 && header[i..].starts_with(needle) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Text following `keyword`, the first word of `header`. Anything before
/// the keyword is punctuation, possibly multibyte.
fn after_keyword<'a>(header: &'a str, keyword: &str) -> &'a str {
    header.find(keyword).map_or("", |i| &header[i + keyword.len()..])
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '@'
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !is_ident_char(c))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Blank out comments, string and char literals and preprocessor lines,
/// keeping line structure intact.
fn clean(text: &str) -> Cleaned {
    let input: Vec<char> = text.chars().collect();
    let mut chars = Vec::with_capacity(input.len());
    let mut lines = Vec::with_capacity(input.len());
    let mut line = 1u32;
    let mut line_has_code = false;
    let mut i = 0;

    // Copy `from..to` as blanks, keeping newlines.
    let blank = |from: usize,
                 to: usize,
                 chars: &mut Vec<char>,
                 lines: &mut Vec<u32>,
                 line: &mut u32| {
        for &c in &input[from..to] {
            chars.push(if c == '\n' { '\n' } else { ' ' });
            lines.push(*line);
            if c == '\n' {
                *line += 1;
            }
        }
    };

    while i < input.len() {
        let c = input[i];
        let next = input.get(i + 1).copied();

        let literal_end = match c {
            '/' if next == Some('/') => Some(find_line_end(&input, i)),
            '#' if !line_has_code => Some(find_line_end(&input, i)),
            '/' if next == Some('*') => Some(find_block_comment_end(&input, i + 2)),
            '"' if input[i..].starts_with(&['"', '"', '"']) => {
                Some(find_raw_string_end(&input, i + 3))
            }
            '"' => {
                let verbatim = i > 0
                    && (input[i - 1] == '@'
                        || (input[i - 1] == '$' && i > 1 && input[i - 2] == '@'));
                Some(find_string_end(&input, i + 1, verbatim))
            }
            '\'' => Some(find_char_end(&input, i + 1)),
            _ => None,
        };

        match literal_end {
            Some(end) => {
                let end = end.min(input.len()).max(i + 1);
                blank(i, end, &mut chars, &mut lines, &mut line);
                line_has_code = true;
                i = end;
            }
            None => {
                chars.push(c);
                lines.push(line);
                if c == '\n' {
                    line += 1;
                    line_has_code = false;
                } else if !c.is_whitespace() {
                    line_has_code = true;
                }
                i += 1;
            }
        }
    }

    Cleaned { chars, lines }
}

fn find_line_end(input: &[char], from: usize) -> usize {
    input[from..]
        .iter()
        .position(|&c| c == '\n')
        .map(|p| from + p)
        .unwrap_or(input.len())
}

fn find_block_comment_end(input: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 1 < input.len() {
        if input[i] == '*' && input[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    input.len()
}

fn find_raw_string_end(input: &[char], from: usize) -> usize {
    let mut i = from;
    while i + 2 < input.len() {
        if input[i] == '"' && input[i + 1] == '"' && input[i + 2] == '"' {
            let mut end = i + 3;
            while end < input.len() && input[end] == '"' {
                end += 1;
            }
            return end;
        }
        i += 1;
    }
    input.len()
}

fn find_string_end(input: &[char], from: usize, verbatim: bool) -> usize {
    let mut i = from;
    while i < input.len() {
        match input[i] {
            '\\' if !verbatim => i += 2,
            '"' if verbatim && input.get(i + 1) == Some(&'"') => i += 2,
            '"' => return i + 1,
            // Unterminated regular strings stop at the line end.
            '\n' if !verbatim => return i,
            _ => i += 1,
        }
    }
    input.len()
}

fn find_char_end(input: &[char], from: usize) -> usize {
    let mut i = from;
    // Char literals are short; anything longer is not a char literal.
    while i < input.len() && i < from + 8 {
        match input[i] {
            '\\' => i += 2,
            '\'' => return i + 1,
            '\n' => return from,
            _ => i += 1,
        }
    }
    from
}
