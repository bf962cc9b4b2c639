//! # Structural PDF Reader and Page Slicer
//!
//! Parses a PDF far enough to count pages and to copy a contiguous page
//! range into a standalone document. Content streams are copied
//! byte-for-byte; nothing is re-rendered.
//!
//! ## Approach
//!
//! The reader linear-scans the file for `N G obj … endobj` spans rather
//! than trusting the cross-reference table. State-portal uploads are
//! frequently produced by scan-and-stamp tools with damaged or
//! incrementally-updated xref tables; the object spans themselves are
//! almost always intact. Files whose page objects live inside
//! compressed object streams (`/Type /ObjStm`) are rejected as
//! [`PdfError::Unsupported`].
//!
//! ## Slicing
//!
//! `slice_pages` materializes inheritable page attributes (resources,
//! boxes, rotation) into each copied page, renumbers the transitive
//! closure of referenced objects, and emits a single-level page tree.
//! Annotations are dropped: they may reference pages outside the slice.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;

/// Error reading or slicing a PDF.
#[derive(Error, Debug)]
pub enum PdfError {
    /// The bytes do not begin with a `%PDF-` header.
    #[error("not a PDF: missing %PDF- header")]
    NotAPdf,

    /// The file ends without a `%%EOF` marker.
    #[error("truncated PDF: missing %%EOF marker")]
    Truncated,

    /// The page tree walk found no pages.
    #[error("PDF contains no pages")]
    NoPages,

    /// A requested page range falls outside the document.
    #[error("page range {start}..={end} outside document with {total} pages")]
    PageOutOfRange { start: u32, end: u32, total: u32 },

    /// The file uses a construct this reader does not handle.
    #[error("unsupported PDF construct: {0}")]
    Unsupported(String),

    /// The object graph is structurally inconsistent.
    #[error("malformed PDF: {0}")]
    Malformed(String),
}

/// Indirect object identifier: (object number, generation).
type ObjId = (u32, u16);
type Dict = BTreeMap<String, Obj>;

/// A parsed PDF object.
#[derive(Debug, Clone, PartialEq)]
enum Obj {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Name(String),
    LitStr(Vec<u8>),
    HexStr(Vec<u8>),
    Array(Vec<Obj>),
    Dict(Dict),
    Ref(ObjId),
    Stream { dict: Dict, data: Vec<u8> },
}

impl Obj {
    fn as_dict(&self) -> Option<&Dict> {
        match self {
            Obj::Dict(d) => Some(d),
            Obj::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }
}

/// Page attributes inherited from ancestor `Pages` nodes when absent on
/// the page itself.
const INHERITABLE_KEYS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Maximum depth for reference resolution and page tree walks.
const MAX_DEPTH: usize = 64;

/// A parsed disclosure PDF.
#[derive(Debug)]
pub struct PdfDocument {
    objects: BTreeMap<ObjId, Obj>,
    /// Page object ids in document order.
    pages: Vec<ObjId>,
}

impl PdfDocument {
    /// Parse a PDF from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, PdfError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(PdfError::NotAPdf);
        }
        if find(bytes, b"%%EOF", 0).is_none() {
            return Err(PdfError::Truncated);
        }

        let objects = scan_indirect_objects(bytes);
        if objects.is_empty() {
            return Err(PdfError::Malformed("no indirect objects found".into()));
        }

        let catalog = find_catalog(bytes, &objects)?;
        let pages_ref = catalog
            .get("Pages")
            .ok_or_else(|| PdfError::Malformed("catalog has no /Pages".into()))?
            .clone();

        let mut pages = Vec::new();
        let mut visited = BTreeSet::new();
        collect_pages(&objects, &pages_ref, &mut pages, &mut visited, 0)?;

        if pages.is_empty() {
            // Object streams hide page objects from the linear scan.
            if objects
                .values()
                .filter_map(Obj::as_dict)
                .any(|d| d.get("Type") == Some(&Obj::Name("ObjStm".into())))
            {
                return Err(PdfError::Unsupported(
                    "page objects inside compressed object streams".into(),
                ));
            }
            return Err(PdfError::NoPages);
        }

        Ok(Self { objects, pages })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Copy pages `start..=end` (1-based, inclusive) into a standalone
    /// PDF, preserving page order and content streams.
    pub fn slice_pages(&self, start: u32, end: u32) -> Result<Vec<u8>, PdfError> {
        let total = self.page_count();
        if start == 0 || start > end || end > total {
            return Err(PdfError::PageOutOfRange { start, end, total });
        }

        let selected: Vec<ObjId> = self.pages[(start - 1) as usize..end as usize].to_vec();

        // Materialize each selected page with its inherited attributes.
        // The dicts still hold old-numbering references at this point.
        let mut page_dicts = Vec::with_capacity(selected.len());
        for &page_id in &selected {
            page_dicts.push(self.materialize_page(page_id)?);
        }

        // Renumber: 1 = catalog, 2 = pages node, 3.. = pages then closure.
        let mut remap: BTreeMap<ObjId, u32> = BTreeMap::new();
        let mut next: u32 = 3;
        for &page_id in &selected {
            remap.insert(page_id, next);
            next += 1;
        }

        // Transitive closure of references from the materialized pages.
        let mut queue: VecDeque<ObjId> = VecDeque::new();
        for dict in &page_dicts {
            collect_refs(&Obj::Dict(dict.clone()), &mut queue);
        }
        while let Some(id) = queue.pop_front() {
            if remap.contains_key(&id) {
                continue;
            }
            let obj = self
                .objects
                .get(&id)
                .ok_or_else(|| PdfError::Malformed(format!("dangling reference {id:?}")))?;
            remap.insert(id, next);
            next += 1;
            collect_refs(obj, &mut queue);
        }

        // Serialize.
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.7\n");
        let mut offsets: BTreeMap<u32, usize> = BTreeMap::new();

        let kids: Vec<String> = selected
            .iter()
            .map(|id| format!("{} 0 R", remap[id]))
            .collect();

        write_indirect(
            &mut out,
            &mut offsets,
            1,
            b"<< /Type /Catalog /Pages 2 0 R >>",
        );
        write_indirect(
            &mut out,
            &mut offsets,
            2,
            format!(
                "<< /Type /Pages /Kids [ {} ] /Count {} >>",
                kids.join(" "),
                selected.len()
            )
            .as_bytes(),
        );

        for (i, &page_id) in selected.iter().enumerate() {
            let mut dict = page_dicts[i].clone();
            dict.insert("Parent".into(), Obj::Ref((2, 0)));
            let body = serialize_obj(&Obj::Dict(dict), &remap)?;
            write_indirect(&mut out, &mut offsets, remap[&page_id], &body);
        }

        // Remaining closure objects, in new-number order for a stable xref.
        let mut rest: Vec<(u32, ObjId)> = remap
            .iter()
            .filter(|(old, _)| !selected.contains(old))
            .map(|(old, new)| (*new, *old))
            .collect();
        rest.sort_unstable();
        for (new_no, old_id) in rest {
            let obj = self
                .objects
                .get(&old_id)
                .ok_or_else(|| PdfError::Malformed(format!("dangling reference {old_id:?}")))?;
            let body = serialize_obj(obj, &remap)?;
            write_indirect(&mut out, &mut offsets, new_no, &body);
        }

        // Classic xref table + trailer.
        let size = next;
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for no in 1..size {
            let offset = offsets.get(&no).copied().unwrap_or(0);
            out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n")
                .as_bytes(),
        );
        Ok(out)
    }

    /// Build a page dict with `/Parent` and `/Annots` removed and
    /// missing inheritable attributes pulled from ancestor nodes.
    fn materialize_page(&self, page_id: ObjId) -> Result<Dict, PdfError> {
        let page = self
            .objects
            .get(&page_id)
            .and_then(Obj::as_dict)
            .ok_or_else(|| PdfError::Malformed(format!("page {page_id:?} is not a dict")))?;

        let mut dict: Dict = page
            .iter()
            .filter(|(k, _)| k.as_str() != "Parent" && k.as_str() != "Annots")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        // Walk ancestors for inherited attributes.
        let mut current = page.get("Parent").cloned();
        let mut depth = 0;
        while let Some(parent_ref) = current {
            depth += 1;
            if depth > MAX_DEPTH {
                return Err(PdfError::Malformed("page tree parent cycle".into()));
            }
            let parent = match self.resolve(&parent_ref, 0)? {
                Obj::Dict(d) => d,
                _ => break,
            };
            for key in INHERITABLE_KEYS {
                if !dict.contains_key(key) {
                    if let Some(value) = parent.get(key) {
                        dict.insert(key.to_string(), value.clone());
                    }
                }
            }
            current = parent.get("Parent").cloned();
        }
        Ok(dict)
    }

    /// Follow reference chains to a direct object.
    fn resolve(&self, obj: &Obj, depth: usize) -> Result<Obj, PdfError> {
        if depth > MAX_DEPTH {
            return Err(PdfError::Malformed("reference chain too deep".into()));
        }
        match obj {
            Obj::Ref(id) => {
                let target = self
                    .objects
                    .get(id)
                    .ok_or_else(|| PdfError::Malformed(format!("dangling reference {id:?}")))?;
                self.resolve(&target.clone(), depth + 1)
            }
            other => Ok(other.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Find `needle` in `buf` at or after `from`.
fn find(buf: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() || needle.is_empty() || needle.len() > buf.len() {
        return None;
    }
    buf[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn is_ws(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Linear-scan the buffer for `N G obj … endobj` spans.
fn scan_indirect_objects(buf: &[u8]) -> BTreeMap<ObjId, Obj> {
    let mut objects = BTreeMap::new();
    let mut cursor = 0usize;
    while let Some(kw) = find(buf, b"obj", cursor) {
        cursor = kw + 3;
        // Token boundary after "obj".
        if kw + 3 < buf.len() && !is_ws(buf[kw + 3]) && !is_delimiter(buf[kw + 3]) {
            continue;
        }
        // Backtrack: ws, generation digits, ws, object-number digits.
        let Some((id, _start)) = backtrack_obj_header(buf, kw) else {
            continue;
        };
        let (parsed, end_pos) = {
            let mut parser = Parser {
                buf,
                pos: kw + 3,
                objects: &objects,
            };
            parser.skip_ws();
            let parsed = parser.parse_object();
            (parsed, parser.pos)
        };
        if let Ok(obj) = parsed {
            // Later definitions win, matching incremental-update order.
            objects.insert(id, obj);
            cursor = end_pos;
        }
    }
    objects
}

/// Parse `N G` immediately before an `obj` keyword at `kw`.
fn backtrack_obj_header(buf: &[u8], kw: usize) -> Option<(ObjId, usize)> {
    let mut i = kw;
    // ws before "obj"
    while i > 0 && is_ws(buf[i - 1]) {
        i -= 1;
    }
    let gen_end = i;
    while i > 0 && buf[i - 1].is_ascii_digit() {
        i -= 1;
    }
    let gen_start = i;
    if gen_start == gen_end {
        return None;
    }
    while i > 0 && is_ws(buf[i - 1]) {
        i -= 1;
    }
    let num_end = i;
    while i > 0 && buf[i - 1].is_ascii_digit() {
        i -= 1;
    }
    let num_start = i;
    if num_start == num_end || num_end == gen_start {
        return None;
    }
    let gen: u16 = std::str::from_utf8(&buf[gen_start..gen_end]).ok()?.parse().ok()?;
    let num: u32 = std::str::from_utf8(&buf[num_start..num_end]).ok()?.parse().ok()?;
    Some(((num, gen), num_start))
}

/// Locate the document catalog: trailer `/Root` first, then any object
/// with `/Type /Catalog`.
fn find_catalog(buf: &[u8], objects: &BTreeMap<ObjId, Obj>) -> Result<Dict, PdfError> {
    let mut cursor = 0usize;
    let mut last_trailer = None;
    while let Some(t) = find(buf, b"trailer", cursor) {
        last_trailer = Some(t);
        cursor = t + 7;
    }
    if let Some(t) = last_trailer {
        let mut parser = Parser {
            buf,
            pos: t + 7,
            objects,
        };
        parser.skip_ws();
        if let Ok(Obj::Dict(trailer)) = parser.parse_object() {
            if let Some(Obj::Ref(root)) = trailer.get("Root") {
                if let Some(catalog) = objects.get(root).and_then(Obj::as_dict) {
                    return Ok(catalog.clone());
                }
            }
        }
    }
    objects
        .values()
        .filter_map(Obj::as_dict)
        .find(|d| d.get("Type") == Some(&Obj::Name("Catalog".into())))
        .cloned()
        .ok_or_else(|| PdfError::Malformed("no document catalog".into()))
}

/// Depth-first walk of the page tree, in `/Kids` order.
fn collect_pages(
    objects: &BTreeMap<ObjId, Obj>,
    node: &Obj,
    pages: &mut Vec<ObjId>,
    visited: &mut BTreeSet<ObjId>,
    depth: usize,
) -> Result<(), PdfError> {
    if depth > MAX_DEPTH {
        return Err(PdfError::Malformed("page tree too deep".into()));
    }
    let id = match node {
        Obj::Ref(id) => *id,
        _ => return Err(PdfError::Malformed("page tree node is not a reference".into())),
    };
    if !visited.insert(id) {
        return Err(PdfError::Malformed("page tree cycle".into()));
    }
    let dict = objects
        .get(&id)
        .and_then(Obj::as_dict)
        .ok_or_else(|| PdfError::Malformed(format!("page tree node {id:?} missing")))?;
    match dict.get("Type") {
        Some(Obj::Name(t)) if t == "Page" => {
            pages.push(id);
        }
        Some(Obj::Name(t)) if t == "Pages" => {
            let kids = match dict.get("Kids") {
                Some(Obj::Array(kids)) => kids.clone(),
                _ => Vec::new(),
            };
            for kid in &kids {
                collect_pages(objects, kid, pages, visited, depth + 1)?;
            }
        }
        _ => {
            // Tolerate untyped intermediate nodes with kids.
            if let Some(Obj::Array(kids)) = dict.get("Kids") {
                for kid in &kids.clone() {
                    collect_pages(objects, kid, pages, visited, depth + 1)?;
                }
            }
        }
    }
    Ok(())
}

/// Push every indirect reference inside `obj` onto the queue.
fn collect_refs(obj: &Obj, queue: &mut VecDeque<ObjId>) {
    match obj {
        Obj::Ref(id) => queue.push_back(*id),
        Obj::Array(items) => {
            for item in items {
                collect_refs(item, queue);
            }
        }
        Obj::Dict(dict) | Obj::Stream { dict, .. } => {
            for value in dict.values() {
                collect_refs(value, queue);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Objects parsed so far, for resolving indirect `/Length` values.
    objects: &'a BTreeMap<ObjId, Obj>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if is_ws(b) {
                self.pos += 1;
            } else if b == b'%' {
                // Comment runs to end of line.
                while let Some(c) = self.peek() {
                    self.pos += 1;
                    if c == b'\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn starts_with(&self, kw: &[u8]) -> bool {
        self.buf[self.pos..].starts_with(kw)
    }

    fn parse_object(&mut self) -> Result<Obj, PdfError> {
        self.skip_ws();
        let b = self.peek().ok_or(PdfError::Truncated)?;
        match b {
            b'<' if self.starts_with(b"<<") => self.parse_dict_or_stream(),
            b'<' => self.parse_hex_string(),
            b'(' => self.parse_literal_string(),
            b'[' => self.parse_array(),
            b'/' => self.parse_name().map(Obj::Name),
            b't' if self.starts_with(b"true") => {
                self.pos += 4;
                Ok(Obj::Bool(true))
            }
            b'f' if self.starts_with(b"false") => {
                self.pos += 5;
                Ok(Obj::Bool(false))
            }
            b'n' if self.starts_with(b"null") => {
                self.pos += 4;
                Ok(Obj::Null)
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number_or_ref(),
            other => Err(PdfError::Malformed(format!(
                "unexpected byte {other:#04x} at offset {}",
                self.pos
            ))),
        }
    }

    fn parse_dict_or_stream(&mut self) -> Result<Obj, PdfError> {
        self.pos += 2; // <<
        let mut dict = Dict::new();
        loop {
            self.skip_ws();
            if self.starts_with(b">>") {
                self.pos += 2;
                break;
            }
            let key = self.parse_name()?;
            let value = self.parse_object()?;
            dict.insert(key, value);
        }
        self.skip_ws();
        if self.starts_with(b"stream") {
            self.pos += 6;
            // EOL after the stream keyword: CRLF or LF.
            if self.starts_with(b"\r\n") {
                self.pos += 2;
            } else if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
            let data = self.read_stream_data(&dict)?;
            return Ok(Obj::Stream { dict, data });
        }
        Ok(Obj::Dict(dict))
    }

    fn read_stream_data(&mut self, dict: &Dict) -> Result<Vec<u8>, PdfError> {
        let declared = match dict.get("Length") {
            Some(Obj::Int(n)) if *n >= 0 => Some(*n as usize),
            Some(Obj::Ref(id)) => match self.objects.get(id) {
                Some(Obj::Int(n)) if *n >= 0 => Some(*n as usize),
                _ => None,
            },
            _ => None,
        };
        let start = self.pos;
        if let Some(len) = declared {
            let end = start + len;
            if end <= self.buf.len() {
                // Verify endstream follows, allowing an EOL between.
                let mut check = end;
                while check < self.buf.len() && is_ws(self.buf[check]) {
                    check += 1;
                }
                if self.buf[check..].starts_with(b"endstream") {
                    self.pos = check + 9;
                    return Ok(self.buf[start..end].to_vec());
                }
            }
        }
        // Declared length missing or wrong: search for the terminator.
        let end = find(self.buf, b"endstream", start)
            .ok_or_else(|| PdfError::Malformed("unterminated stream".into()))?;
        let mut data_end = end;
        while data_end > start && is_ws(self.buf[data_end - 1]) {
            data_end -= 1;
        }
        self.pos = end + 9;
        Ok(self.buf[start..data_end].to_vec())
    }

    fn parse_array(&mut self) -> Result<Obj, PdfError> {
        self.pos += 1; // [
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b']') {
                self.pos += 1;
                break;
            }
            if self.peek().is_none() {
                return Err(PdfError::Truncated);
            }
            items.push(self.parse_object()?);
        }
        Ok(Obj::Array(items))
    }

    fn parse_name(&mut self) -> Result<String, PdfError> {
        if self.peek() != Some(b'/') {
            return Err(PdfError::Malformed(format!(
                "expected name at offset {}",
                self.pos
            )));
        }
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_ws(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.buf[start..self.pos];
        // #xx escapes per the name syntax.
        let mut name = String::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
                if let Some(code) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    name.push(code as char);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i] as char);
            i += 1;
        }
        Ok(name)
    }

    fn parse_literal_string(&mut self) -> Result<Obj, PdfError> {
        self.pos += 1; // (
        let mut out = Vec::new();
        let mut depth = 1usize;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'\\' => {
                    if let Some(esc) = self.peek() {
                        self.pos += 1;
                        match esc {
                            b'n' => out.push(b'\n'),
                            b'r' => out.push(b'\r'),
                            b't' => out.push(b'\t'),
                            b'b' => out.push(8),
                            b'f' => out.push(12),
                            other => out.push(other),
                        }
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Obj::LitStr(out));
                    }
                    out.push(b);
                }
                other => out.push(other),
            }
        }
        Err(PdfError::Truncated)
    }

    fn parse_hex_string(&mut self) -> Result<Obj, PdfError> {
        self.pos += 1; // <
        let mut digits = Vec::new();
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                if digits.len() % 2 == 1 {
                    digits.push(b'0');
                }
                let mut out = Vec::with_capacity(digits.len() / 2);
                for pair in digits.chunks(2) {
                    let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
                    let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
                    out.push((hi << 4) | lo);
                }
                return Ok(Obj::HexStr(out));
            }
            if b.is_ascii_hexdigit() {
                digits.push(b);
            }
        }
        Err(PdfError::Truncated)
    }

    fn parse_number_or_ref(&mut self) -> Result<Obj, PdfError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let mut is_real = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    is_real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.buf[start..self.pos])
            .map_err(|_| PdfError::Malformed("non-utf8 number".into()))?;
        if is_real {
            let value: f64 = text
                .parse()
                .map_err(|_| PdfError::Malformed(format!("bad real: {text}")))?;
            return Ok(Obj::Real(value));
        }
        let value: i64 = text
            .parse()
            .map_err(|_| PdfError::Malformed(format!("bad integer: {text}")))?;

        // Lookahead for `G R` — an indirect reference.
        if value >= 0 {
            let save = self.pos;
            let mut probe = Parser {
                buf: self.buf,
                pos: self.pos,
                objects: self.objects,
            };
            probe.skip_ws();
            let gen_start = probe.pos;
            while probe.peek().is_some_and(|b| b.is_ascii_digit()) {
                probe.pos += 1;
            }
            if probe.pos > gen_start {
                let gen_text = std::str::from_utf8(&self.buf[gen_start..probe.pos]).unwrap_or("");
                probe.skip_ws();
                if probe.peek() == Some(b'R')
                    && probe
                        .buf
                        .get(probe.pos + 1)
                        .map_or(true, |&b| is_ws(b) || is_delimiter(b))
                {
                    if let Ok(gen) = gen_text.parse::<u16>() {
                        self.pos = probe.pos + 1;
                        return Ok(Obj::Ref((value as u32, gen)));
                    }
                }
            }
            self.pos = save;
        }
        Ok(Obj::Int(value))
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn write_indirect(out: &mut Vec<u8>, offsets: &mut BTreeMap<u32, usize>, no: u32, body: &[u8]) {
    offsets.insert(no, out.len());
    out.extend_from_slice(format!("{no} 0 obj\n").as_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(b"\nendobj\n");
}

/// Serialize an object with references renumbered through `remap`.
fn serialize_obj(obj: &Obj, remap: &BTreeMap<ObjId, u32>) -> Result<Vec<u8>, PdfError> {
    let mut out = Vec::new();
    write_obj(&mut out, obj, remap)?;
    Ok(out)
}

fn write_obj(out: &mut Vec<u8>, obj: &Obj, remap: &BTreeMap<ObjId, u32>) -> Result<(), PdfError> {
    match obj {
        Obj::Null => out.extend_from_slice(b"null"),
        Obj::Bool(true) => out.extend_from_slice(b"true"),
        Obj::Bool(false) => out.extend_from_slice(b"false"),
        Obj::Int(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Obj::Real(x) => out.extend_from_slice(format!("{x}").as_bytes()),
        Obj::Name(name) => {
            out.push(b'/');
            out.extend_from_slice(name.as_bytes());
        }
        Obj::LitStr(bytes) => {
            out.push(b'(');
            for &b in bytes {
                if matches!(b, b'(' | b')' | b'\\') {
                    out.push(b'\\');
                }
                out.push(b);
            }
            out.push(b')');
        }
        Obj::HexStr(bytes) => {
            out.push(b'<');
            for b in bytes {
                out.extend_from_slice(format!("{b:02x}").as_bytes());
            }
            out.push(b'>');
        }
        Obj::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_obj(out, item, remap)?;
            }
            out.push(b']');
        }
        Obj::Dict(dict) => write_dict(out, dict, remap)?,
        Obj::Stream { dict, data } => {
            // /Length always reflects the copied bytes.
            let mut dict = dict.clone();
            dict.insert("Length".into(), Obj::Int(data.len() as i64));
            write_dict(out, &dict, remap)?;
            out.extend_from_slice(b"\nstream\n");
            out.extend_from_slice(data);
            out.extend_from_slice(b"\nendstream");
        }
        Obj::Ref(id) => {
            let new = remap
                .get(id)
                .ok_or_else(|| PdfError::Malformed(format!("unmapped reference {id:?}")))?;
            out.extend_from_slice(format!("{new} 0 R").as_bytes());
        }
    }
    Ok(())
}

fn write_dict(out: &mut Vec<u8>, dict: &Dict, remap: &BTreeMap<ObjId, u32>) -> Result<(), PdfError> {
    out.extend_from_slice(b"<< ");
    for (key, value) in dict {
        out.push(b'/');
        out.extend_from_slice(key.as_bytes());
        out.push(b' ');
        write_obj(out, value, remap)?;
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
    Ok(())
}
