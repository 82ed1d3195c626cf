use proc_macro2::TokenStream;
use quote::quote;
use serde_json::{Map, Value};
use syn::parse::Parse;
use syn::{Data, DeriveInput, Expr, Fields, GenericArgument, Lit, Meta, PathArguments, Result, Type};

pub fn expand(input: TokenStream) -> Result<TokenStream> {
    let input: DeriveInput = syn::parse2(input)?;
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => &f.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "JsonSchema requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "JsonSchema can only be derived for structs",
            ))
        }
    };

    let container = parse_serde_attrs(&input.attrs);

    let mut properties = Map::new();
    let mut required = Vec::<Value>::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let serde = parse_serde_attrs(&field.attrs);
        if serde.skip {
            continue;
        }
        let field_name = match (&serde.rename, &container.rename_all) {
            (Some(renamed), _) => renamed.clone(),
            (None, Some(rule)) => apply_rename_rule(rule, &ident.to_string()),
            (None, None) => ident.to_string(),
        };

        let mut prop = Map::new();

        // Doc comments -> description
        if let Some(desc) = extract_doc_comment(&field.attrs) {
            prop.insert("description".into(), Value::String(desc));
        }

        let (is_optional, inner) = unwrap_option(&field.ty);
        prop.extend(type_schema(inner));

        if !is_optional && !serde.default && !container.default {
            required.push(Value::String(field_name.clone()));
        }

        // #[schema(...)] attributes
        parse_schema_attrs(&field.attrs, &mut prop)?;

        properties.insert(field_name, Value::Object(prop));
    }

    let mut schema = Map::new();
    schema.insert(
        "$schema".into(),
        Value::String("http://json-schema.org/draft-07/schema#".into()),
    );
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }

    let schema_json = serde_json::to_string(&Value::Object(schema)).map_err(|err| {
        syn::Error::new_spanned(name, format!("failed to serialize schema JSON: {err}"))
    })?;

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::syncline_sdk::JsonSchema for #name #ty_generics #where_clause {
            const SCHEMA_JSON: &'static str = #schema_json;
        }
    })
}

// -- Helpers ------------------------------------------------------------------

fn extract_doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr_lit) => match &expr_lit.lit {
                    Lit::Str(s) => Some(s.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}

/// The subset of `#[serde(...)]` that changes the shape of the document.
#[derive(Default)]
struct SerdeAttrs {
    default: bool,
    skip: bool,
    rename: Option<String>,
    rename_all: Option<String>,
}

fn parse_serde_attrs(attrs: &[syn::Attribute]) -> SerdeAttrs {
    let mut out = SerdeAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        // Unknown serde keys are consumed and ignored; serde itself reports misuse.
        let _ = attr.parse_nested_meta(|meta| {
            let key = meta.path.get_ident().map(ToString::to_string).unwrap_or_default();
            let mut string_value = None;
            if meta.input.peek(syn::Token![=]) {
                let expr: Expr = meta.value()?.parse()?;
                if let Expr::Lit(syn::ExprLit { lit: Lit::Str(s), .. }) = expr {
                    string_value = Some(s.value());
                }
            } else if meta.input.peek(syn::token::Paren) {
                let _content;
                syn::parenthesized!(_content in meta.input);
            }
            match key.as_str() {
                "default" => out.default = true,
                "skip" | "skip_deserializing" => out.skip = true,
                "rename" => out.rename = string_value,
                "rename_all" => out.rename_all = string_value,
                _ => {}
            }
            Ok(())
        });
    }
    out
}

fn apply_rename_rule(rule: &str, field: &str) -> String {
    let words: Vec<&str> = field.split('_').filter(|w| !w.is_empty()).collect();
    let capitalize = |w: &str| {
        let mut chars = w.chars();
        chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default()
    };
    match rule {
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { (*w).to_string() } else { capitalize(*w) })
            .collect(),
        "PascalCase" => words.iter().map(|w| capitalize(*w)).collect(),
        "kebab-case" => words.join("-"),
        "SCREAMING_SNAKE_CASE" | "UPPERCASE" => field.to_uppercase(),
        _ => field.to_string(),
    }
}

/// Returns `(is_optional, inner_type)`.
fn unwrap_option(ty: &Type) -> (bool, &Type) {
    match last_segment(ty) {
        Some(seg) if seg.ident == "Option" => match first_type_arg(seg) {
            Some(inner) => (true, inner),
            None => (true, ty),
        },
        _ => (false, ty),
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(tp) => tp.path.segments.last(),
        _ => None,
    }
}

fn type_args(seg: &syn::PathSegment) -> Vec<&Type> {
    match &seg.arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|a| match a {
                GenericArgument::Type(t) => Some(t),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn first_type_arg(seg: &syn::PathSegment) -> Option<&Type> {
    type_args(seg).into_iter().next()
}

fn json_type(ty: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("type".into(), Value::String(ty.into()));
    m
}

fn type_schema(ty: &Type) -> Map<String, Value> {
    match ty {
        Type::Reference(r) => return type_schema(&r.elem),
        Type::Array(a) => return array_of(&a.elem),
        Type::Slice(s) => return array_of(&s.elem),
        _ => {}
    }

    let Some(seg) = last_segment(ty) else {
        return json_type("string");
    };
    let ident = seg.ident.to_string();
    match ident.as_str() {
        "String" | "str" | "char" => json_type("string"),
        "bool" => json_type("boolean"),
        "f32" | "f64" => json_type("number"),
        "u8" | "u16" | "u32" | "u64" | "u128" | "usize" | "i8" | "i16" | "i32" | "i64" | "i128"
        | "isize" => json_type("integer"),
        "MaskedString" => {
            let mut m = json_type("string");
            m.insert("x-secret".into(), Value::Bool(true));
            m
        }
        "DateTime" | "NaiveDateTime" => with_format(json_type("string"), "date-time"),
        "NaiveDate" => with_format(json_type("string"), "date"),
        "Value" => Map::new(),
        "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => match first_type_arg(seg) {
            Some(inner) => array_of(inner),
            None => json_type("array"),
        },
        "HashMap" | "BTreeMap" => {
            let mut m = json_type("object");
            if let Some(value_ty) = type_args(seg).get(1) {
                m.insert("additionalProperties".into(), Value::Object(type_schema(value_ty)));
            }
            m
        }
        "Box" | "Arc" | "Rc" => first_type_arg(seg).map(type_schema).unwrap_or_default(),
        "Option" => first_type_arg(seg).map(type_schema).unwrap_or_default(),
        _ => json_type("string"), // custom types fall back to string; override with `kind`
    }
}

fn array_of(inner: &Type) -> Map<String, Value> {
    let mut m = json_type("array");
    m.insert("items".into(), Value::Object(type_schema(inner)));
    m
}

fn with_format(mut m: Map<String, Value>, format: &str) -> Map<String, Value> {
    m.insert("format".into(), Value::String(format.into()));
    m
}

fn parse_schema_attrs(attrs: &[syn::Attribute], prop: &mut Map<String, Value>) -> Result<()> {
    for attr in attrs {
        if !attr.path().is_ident("schema") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("secret") {
                prop.insert("x-secret".into(), Value::Bool(true));
            } else if meta.path.is_ident("advanced") {
                prop.insert("x-advanced".into(), Value::Bool(true));
            } else if meta.path.is_ident("default") {
                let _eq: syn::Token![=] = meta.input.parse()?;
                let lit: Lit = meta.input.parse()?;
                prop.insert("default".into(), lit_to_json(&lit)?);
            } else if meta.path.is_ident("example") {
                let _eq: syn::Token![=] = meta.input.parse()?;
                let lit: Lit = meta.input.parse()?;
                let arr = prop
                    .entry("examples")
                    .or_insert_with(|| Value::Array(vec![]));
                if let Value::Array(a) = arr {
                    a.push(lit_to_json(&lit)?);
                }
            } else if meta.path.is_ident("env") {
                let _eq: syn::Token![=] = meta.input.parse()?;
                let lit: syn::LitStr = meta.input.parse()?;
                prop.insert("x-env-var".into(), Value::String(lit.value()));
            } else if meta.path.is_ident("kind") {
                let _eq: syn::Token![=] = meta.input.parse()?;
                let lit: syn::LitStr = meta.input.parse()?;
                prop.insert("type".into(), Value::String(lit.value()));
                if lit.value() != "array" {
                    prop.remove("items");
                }
            } else if meta.path.is_ident("format") {
                let _eq: syn::Token![=] = meta.input.parse()?;
                let lit: syn::LitStr = meta.input.parse()?;
                prop.insert("format".into(), Value::String(lit.value()));
            } else if meta.path.is_ident("values") {
                let content;
                syn::parenthesized!(content in meta.input);
                let vals = content.parse_terminated(Lit::parse, syn::Token![,])?;
                let enum_vals: Vec<Value> = vals.iter().map(lit_to_json).collect::<Result<Vec<_>>>()?;
                prop.insert("enum".into(), Value::Array(enum_vals));
            } else {
                return Err(meta.error(format!(
                    "unknown schema attribute: `{}`",
                    meta.path
                        .get_ident()
                        .map(|i| i.to_string())
                        .unwrap_or_default()
                )));
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn lit_to_json(lit: &Lit) -> Result<Value> {
    match lit {
        Lit::Str(s) => Ok(Value::String(s.value())),
        Lit::Int(i) => {
            let parsed = i
                .base10_parse::<i64>()
                .map_err(|e| syn::Error::new_spanned(i, format!("invalid integer literal: {e}")))?;
            Ok(Value::Number(serde_json::Number::from(parsed)))
        }
        Lit::Float(f) => {
            let parsed = f
                .base10_parse::<f64>()
                .map_err(|e| syn::Error::new_spanned(f, format!("invalid float literal: {e}")))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| syn::Error::new_spanned(f, "float literal must be finite"))
        }
        Lit::Bool(b) => Ok(Value::Bool(b.value())),
        _ => Ok(Value::Null),
    }
}
