// COMPACT format decoding
//
// RETS servers answer with a thin XML envelope around tab-delimited
// payloads. Only the handful of tags this client consumes are decoded:
// the `<RETS>` reply header, `<DELIMITER>`, `<COLUMNS>`/`<DATA>` rows
// inside named metadata elements, `<COUNT>`, and the `Key=Value` lines
// of a login `<RETS-RESPONSE>`.

use indexmap::IndexMap;

use crate::error::Error;

/// The `ReplyCode` / `ReplyText` pair from a `<RETS>` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u32,
    pub text: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero reply into an [`Error::Rets`].
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::Rets {
                code: self.code,
                text: self.text,
            })
        }
    }
}

/// One row of a metadata table, keyed by column name in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRow(IndexMap<String, String>);

impl MetadataRow {
    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Value of the named column, if the server sent it.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Value of the named column, or `""` when absent.
    pub fn field(&self, column: &str) -> &str {
        self.get(column).unwrap_or_default()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Decode the `<RETS ReplyCode=".." ReplyText="..">` header.
pub fn parse_reply(body: &str) -> Result<Reply, Error> {
    let tag = open_tag(body, "RETS").ok_or_else(|| Error::decode("missing <RETS> element", body))?;
    let code = attribute(tag, "ReplyCode")
        .ok_or_else(|| Error::decode("missing ReplyCode attribute", body))?;
    let code = code
        .trim()
        .parse::<u32>()
        .map_err(|e| Error::decode(format!("invalid ReplyCode {code:?}: {e}"), body))?;
    let text = attribute(tag, "ReplyText").unwrap_or_default();
    Ok(Reply { code, text })
}

/// Decode every row of every `<{element}>` block, in document order.
///
/// A body without the element is an empty result: servers omit the
/// element entirely when the requested scope has no metadata.
pub fn parse_metadata(body: &str, element: &str) -> Result<Vec<MetadataRow>, Error> {
    let delimiter = parse_delimiter(body)?;
    let mut rows = Vec::new();

    for inner in element_bodies(body, element) {
        let Some(columns) = tag_contents(inner, "COLUMNS").next() else {
            continue;
        };
        let columns = split_compact(columns, delimiter);
        for data in tag_contents(inner, "DATA") {
            let values = split_compact(data, delimiter);
            rows.push(MetadataRow(
                columns.iter().cloned().zip(values).collect(),
            ));
        }
    }
    Ok(rows)
}

/// Decode `<COUNT Records="N"/>`.
pub fn parse_count(body: &str) -> Result<u64, Error> {
    let tag = open_tag(body, "COUNT").ok_or_else(|| Error::decode("missing <COUNT> element", body))?;
    let records = attribute(tag, "Records")
        .ok_or_else(|| Error::decode("missing Records attribute", body))?;
    records
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::decode(format!("invalid record count {records:?}: {e}"), body))
}

/// Decode the `Key=Value` lines of a login response.
///
/// RETS 1.5+ wraps them in `<RETS-RESPONSE>`; older servers put them
/// directly inside `<RETS>`. Keys are returned as sent.
pub fn parse_key_values(body: &str) -> Vec<(String, String)> {
    let section = tag_contents(body, "RETS-RESPONSE")
        .next()
        .or_else(|| element_bodies(body, "RETS").next())
        .unwrap_or(body);

    section
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('<'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_owned(), unescape(v.trim())))
        .collect()
}

/// The field delimiter announced by `<DELIMITER value="09"/>` (hex), tab by default.
fn parse_delimiter(body: &str) -> Result<char, Error> {
    let Some(tag) = open_tag(body, "DELIMITER") else {
        return Ok('\t');
    };
    let Some(value) = attribute(tag, "value") else {
        return Ok('\t');
    };
    u8::from_str_radix(value.trim(), 16)
        .map(char::from)
        .map_err(|e| Error::decode(format!("invalid DELIMITER {value:?}: {e}"), body))
}

/// Split a COMPACT row. Rows carry one leading and one trailing delimiter.
fn split_compact(row: &str, delimiter: char) -> Vec<String> {
    let row = row.strip_prefix(delimiter).unwrap_or(row);
    let row = row.strip_suffix(delimiter).unwrap_or(row);
    row.split(delimiter).map(unescape).collect()
}

/// The attribute text of the first `<name ...>` opening tag.
fn open_tag<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let (start, _) = find_open(body, name, 0)?;
    let rest = &body[start..];
    let end = rest.find('>')?;
    Some(&rest[..end])
}

/// Byte offsets of the next `<name` that is a complete tag name, starting at `from`.
fn find_open(body: &str, name: &str, from: usize) -> Option<(usize, usize)> {
    let needle = format!("<{name}");
    let mut cursor = from;
    while let Some(pos) = body[cursor..].find(&needle) {
        let start = cursor + pos;
        let after = start + needle.len();
        match body[after..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some((start, after)),
            None => return None,
            _ => cursor = after,
        }
    }
    None
}

/// Inner text of each `<name ...>...</name>` block. Self-closing tags yield nothing.
fn element_bodies<'a>(body: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let close = format!("</{name}>");
    let mut cursor = 0;
    std::iter::from_fn(move || {
        loop {
            let (start, _) = find_open(body, name, cursor)?;
            let tag_end = start + body[start..].find('>')?;
            if body[..tag_end].ends_with('/') {
                cursor = tag_end + 1;
                continue;
            }
            let inner_start = tag_end + 1;
            let inner_end = inner_start + body[inner_start..].find(&close)?;
            cursor = inner_end + close.len();
            return Some(&body[inner_start..inner_end]);
        }
    })
}

/// Contents of each `<NAME>...</NAME>` (attribute-less) tag.
fn tag_contents<'a>(body: &'a str, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let mut cursor = 0;
    std::iter::from_fn(move || {
        let start = cursor + body[cursor..].find(&open)? + open.len();
        let end = start + body[start..].find(&close)?;
        cursor = end + close.len();
        Some(&body[start..end])
    })
}

/// Value of `name="..."` or `name='...'` inside an opening tag.
fn attribute(tag: &str, name: &str) -> Option<String> {
    let needle = format!("{name}=");
    let mut cursor = 0;
    while let Some(pos) = tag[cursor..].find(&needle) {
        let start = cursor + pos;
        let value_start = start + needle.len();
        let preceded_by_space = tag[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        let quote = tag[value_start..].chars().next().filter(|q| matches!(q, '"' | '\''));
        if let (true, Some(quote)) = (preceded_by_space, quote) {
            let value_start = value_start + 1;
            let len = tag[value_start..].find(quote)?;
            return Some(unescape(&tag[value_start..value_start + len]));
        }
        cursor = value_start;
    }
    None
}

fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOOKUPS: &str = "<RETS ReplyCode=\"0\" ReplyText=\"Operation Successful\">\n\
        <METADATA-LOOKUP_TYPE Resource=\"Property\" Lookup=\"ListingStatus\" Version=\"1.00.000\">\n\
        <COLUMNS>\tLongValue\tShortValue\tValue\t</COLUMNS>\n\
        <DATA>\tActive\tAct\tA\t</DATA>\n\
        <DATA>\tSold w/ Cond.\tSld\tS\t</DATA>\n\
        </METADATA-LOOKUP_TYPE>\n\
        </RETS>";

    #[test]
    fn reply_header_is_decoded() {
        let reply = parse_reply(LOOKUPS).unwrap();
        assert_eq!(reply.code, 0);
        assert_eq!(reply.text, "Operation Successful");
        assert!(reply.into_result().is_ok());
    }

    #[test]
    fn metadata_rows_keep_column_names_and_order() {
        let rows = parse_metadata(LOOKUPS, "METADATA-LOOKUP_TYPE").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Value"), Some("A"));
        assert_eq!(rows[1].get("LongValue"), Some("Sold w/ Cond."));
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["LongValue", "ShortValue", "Value"]
        );
    }

    #[test]
    fn empty_fields_survive_splitting() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"\">\
            <METADATA-TABLE Resource=\"Property\" Class=\"RE_1\">\
            <COLUMNS>\tSystemName\tLookupName\t</COLUMNS>\
            <DATA>\tListPrice\t\t</DATA>\
            </METADATA-TABLE></RETS>";
        let rows = parse_metadata(body, "METADATA-TABLE").unwrap();
        assert_eq!(rows[0].get("SystemName"), Some("ListPrice"));
        assert_eq!(rows[0].get("LookupName"), Some(""));
    }

    #[test]
    fn custom_delimiter_is_honoured() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"ok\"><DELIMITER value=\"7C\"/>\
            <METADATA-CLASS Resource=\"Agent\"><COLUMNS>|ClassName|Description|</COLUMNS>\
            <DATA>|Agent|Agents &amp; Offices|</DATA></METADATA-CLASS></RETS>";
        let rows = parse_metadata(body, "METADATA-CLASS").unwrap();
        assert_eq!(rows[0].get("ClassName"), Some("Agent"));
        assert_eq!(rows[0].get("Description"), Some("Agents & Offices"));
    }

    #[test]
    fn element_name_prefixes_do_not_match() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"ok\">\
            <METADATA-TABLE_EXTRA><COLUMNS>\tX\t</COLUMNS><DATA>\t1\t</DATA></METADATA-TABLE_EXTRA>\
            </RETS>";
        assert!(parse_metadata(body, "METADATA-TABLE").unwrap().is_empty());
    }

    #[test]
    fn multiple_elements_are_concatenated() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"ok\">\
            <METADATA-CLASS Resource=\"Property\"><COLUMNS>\tClassName\t</COLUMNS><DATA>\tRE_1\t</DATA></METADATA-CLASS>\
            <METADATA-CLASS Resource=\"Property\"><COLUMNS>\tClassName\t</COLUMNS><DATA>\tLD_2\t</DATA></METADATA-CLASS>\
            </RETS>";
        let names: Vec<_> = parse_metadata(body, "METADATA-CLASS")
            .unwrap()
            .iter()
            .map(|r| r.field("ClassName").to_owned())
            .collect();
        assert_eq!(names, vec!["RE_1", "LD_2"]);
    }

    #[test]
    fn count_is_read_from_records_attribute() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"Success\">\n<COUNT Records=\"1234\" />\n</RETS>";
        assert_eq!(parse_count(body).unwrap(), 1234);
    }

    #[test]
    fn self_closing_rets_reply_is_decoded() {
        let body = "<RETS ReplyCode=\"20201\" ReplyText=\"No Records Found\" />";
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.code, 20201);
        assert!(matches!(
            reply.into_result(),
            Err(Error::Rets { code: 20201, .. })
        ));
    }

    #[test]
    fn login_key_values_are_read_from_response_section() {
        let body = "<RETS ReplyCode=\"0\" ReplyText=\"Success\">\n\
            <RETS-RESPONSE>\n\
            MemberName=Jane Doe\n\
            GetMetadata=/rets/getmetadata\n\
            Search=/rets/search?a=1&amp;b=2\n\
            Logout=/rets/logout\n\
            </RETS-RESPONSE>\n\
            </RETS>";
        let pairs = parse_key_values(body);
        assert!(pairs.contains(&("GetMetadata".into(), "/rets/getmetadata".into())));
        assert!(pairs.contains(&("Search".into(), "/rets/search?a=1&b=2".into())));
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn single_quoted_attributes_are_accepted() {
        let body = "<RETS ReplyCode='20201' ReplyText='No Records Found' />";
        let reply = parse_reply(body).unwrap();
        assert_eq!(reply.code, 20201);
        assert_eq!(reply.text, "No Records Found");

        let body = "<RETS ReplyCode='0'><COUNT Records='7'/></RETS>";
        assert_eq!(parse_count(body).unwrap(), 7);
    }

    #[test]
    fn missing_envelope_is_a_decode_error() {
        let err = parse_reply("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
