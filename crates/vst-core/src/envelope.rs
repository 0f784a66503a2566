//! Minimal envelope codec for the small, fixed-shape tuples VST chunks
//! carry ahead of the opaque request/response body.
//!
//! The real VelocyPack value encoder is an external collaborator per the
//! driver's scope (see the crate root docs) — arbitrary domain objects are
//! never passed through here. This module only ever needs to produce and
//! parse the request envelope `[version, type, database, method, path,
//! queryParams, headerParams]`, the response envelope `[version, type,
//! code, meta]`, and the authentication envelope. `Value` is the minimal
//! self-describing binary shape that covers exactly those cases; swapping
//! in a full VelocyPack encoder later means reimplementing this module
//! without touching any caller.

use std::collections::HashMap;

use crate::error::DriverError;
use crate::model::Request;
use crate::wire::{message_type, PROTOCOL_VERSION};

const TAG_NULL: u8 = 0x00;
const TAG_FALSE: u8 = 0x01;
const TAG_TRUE: u8 = 0x02;
const TAG_INT: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_ARRAY: u8 = 0x05;
const TAG_OBJECT: u8 = 0x06;

/// A small value tree, just expressive enough for the envelope shapes VST
/// needs (integers, strings, string/string maps, and fixed-size arrays).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(pairs) => Some(pairs.as_slice()),
            _ => None,
        }
    }

    pub fn object_from_map(map: &HashMap<String, String>) -> Self {
        Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }

    pub fn into_string_map(self) -> HashMap<String, String> {
        match self {
            Value::Object(pairs) => pairs
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect(),
            _ => HashMap::new(),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Value::Null => out.push(TAG_NULL),
            Value::Bool(false) => out.push(TAG_FALSE),
            Value::Bool(true) => out.push(TAG_TRUE),
            Value::Int(v) => {
                out.push(TAG_INT);
                out.extend_from_slice(&v.to_le_bytes());
            }
            Value::String(s) => {
                out.push(TAG_STRING);
                out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                out.push(TAG_ARRAY);
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode(out);
                }
            }
            Value::Object(pairs) => {
                out.push(TAG_OBJECT);
                out.extend_from_slice(&(pairs.len() as u32).to_le_bytes());
                for (k, v) in pairs {
                    Value::String(k.clone()).encode(out);
                    v.encode(out);
                }
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Value, usize), DriverError> {
        let tag = *buf
            .first()
            .ok_or_else(|| DriverError::protocol("empty envelope value"))?;
        let mut pos = 1usize;
        let read_u32 = |buf: &[u8], pos: usize| -> Result<u32, DriverError> {
            let bytes = buf
                .get(pos..pos + 4)
                .ok_or_else(|| DriverError::protocol("truncated envelope length"))?;
            Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
        };
        match tag {
            TAG_NULL => Ok((Value::Null, pos)),
            TAG_FALSE => Ok((Value::Bool(false), pos)),
            TAG_TRUE => Ok((Value::Bool(true), pos)),
            TAG_INT => {
                let bytes = buf
                    .get(pos..pos + 8)
                    .ok_or_else(|| DriverError::protocol("truncated envelope int"))?;
                let v = i64::from_le_bytes(bytes.try_into().unwrap());
                Ok((Value::Int(v), pos + 8))
            }
            TAG_STRING => {
                let len = read_u32(buf, pos)? as usize;
                pos += 4;
                let bytes = buf
                    .get(pos..pos + len)
                    .ok_or_else(|| DriverError::protocol("truncated envelope string"))?;
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| DriverError::protocol("envelope string not utf-8"))?;
                Ok((Value::String(s), pos + len))
            }
            TAG_ARRAY => {
                let count = read_u32(buf, pos)?;
                pos += 4;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (v, consumed) = Value::decode(&buf[pos..])?;
                    items.push(v);
                    pos += consumed;
                }
                Ok((Value::Array(items), pos))
            }
            TAG_OBJECT => {
                let count = read_u32(buf, pos)?;
                pos += 4;
                let mut pairs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (k, consumed) = Value::decode(&buf[pos..])?;
                    pos += consumed;
                    let key = k
                        .as_str()
                        .ok_or_else(|| DriverError::protocol("envelope object key not a string"))?
                        .to_owned();
                    let (v, consumed) = Value::decode(&buf[pos..])?;
                    pos += consumed;
                    pairs.push((key, v));
                }
                Ok((Value::Object(pairs), pos))
            }
            other => Err(DriverError::protocol(format!("unknown envelope tag {other}"))),
        }
    }
}

/// Builds the 7-element request envelope (without the body).
pub fn encode_request_envelope(req: &Request) -> Vec<u8> {
    let array = Value::Array(vec![
        Value::Int(req.version),
        Value::Int(message_type::REQUEST),
        Value::String(req.database.clone()),
        Value::Int(req.method.code()),
        Value::String(req.path.clone()),
        Value::object_from_map(&req.query_params),
        Value::object_from_map(&req.header_params),
    ]);
    let mut out = Vec::new();
    array.encode(&mut out);
    out
}

/// Parsed form of a request envelope, used only by test fixtures that play
/// the server side of the protocol.
pub struct ParsedRequestEnvelope {
    pub version: i64,
    pub database: String,
    pub method_code: i64,
    pub path: String,
    pub query_params: HashMap<String, String>,
    pub header_params: HashMap<String, String>,
}

pub fn decode_request_envelope(buf: &[u8]) -> Result<(ParsedRequestEnvelope, usize), DriverError> {
    let (value, consumed) = Value::decode(buf)?;
    let items = value
        .as_array()
        .ok_or_else(|| DriverError::protocol("request envelope is not an array"))?;
    if items.len() != 7 {
        return Err(DriverError::protocol("request envelope has wrong arity"));
    }
    let parsed = ParsedRequestEnvelope {
        version: items[0].as_int().ok_or_else(|| DriverError::protocol("bad version"))?,
        database: items[2].as_str().ok_or_else(|| DriverError::protocol("bad database"))?.to_owned(),
        method_code: items[3].as_int().ok_or_else(|| DriverError::protocol("bad method"))?,
        path: items[4].as_str().ok_or_else(|| DriverError::protocol("bad path"))?.to_owned(),
        query_params: items[5].clone().into_string_map(),
        header_params: items[6].clone().into_string_map(),
    };
    Ok((parsed, consumed))
}

/// Builds the response envelope (without the body).
pub fn encode_response_envelope(code: i64, meta: &HashMap<String, String>) -> Vec<u8> {
    let array = Value::Array(vec![
        Value::Int(PROTOCOL_VERSION),
        Value::Int(message_type::RESPONSE),
        Value::Int(code),
        Value::object_from_map(meta),
    ]);
    let mut out = Vec::new();
    array.encode(&mut out);
    out
}

pub struct ParsedResponseEnvelope {
    pub version: i64,
    pub code: i64,
    pub meta: HashMap<String, String>,
}

pub fn decode_response_envelope(buf: &[u8]) -> Result<(ParsedResponseEnvelope, usize), DriverError> {
    let (value, consumed) = Value::decode(buf)?;
    let items = value
        .as_array()
        .ok_or_else(|| DriverError::protocol("response envelope is not an array"))?;
    if items.len() < 3 {
        return Err(DriverError::protocol("response envelope has wrong arity"));
    }
    let meta = if items.len() >= 4 {
        items[3].clone().into_string_map()
    } else {
        HashMap::new()
    };
    let parsed = ParsedResponseEnvelope {
        version: items[0].as_int().ok_or_else(|| DriverError::protocol("bad version"))?,
        code: items[2].as_int().ok_or_else(|| DriverError::protocol("bad code"))?,
        meta,
    };
    Ok((parsed, consumed))
}

/// Basic (plain user/password) authentication envelope.
pub fn encode_auth_basic(user: &str, password: &str) -> Vec<u8> {
    let array = Value::Array(vec![
        Value::Int(PROTOCOL_VERSION),
        Value::Int(message_type::AUTHENTICATION),
        Value::String("plain".to_owned()),
        Value::String(user.to_owned()),
        Value::String(password.to_owned()),
    ]);
    let mut out = Vec::new();
    array.encode(&mut out);
    out
}

/// JWT authentication envelope.
pub fn encode_auth_jwt(token: &str) -> Vec<u8> {
    let array = Value::Array(vec![
        Value::Int(PROTOCOL_VERSION),
        Value::Int(message_type::AUTHENTICATION),
        Value::String("jwt".to_owned()),
        Value::String(token.to_owned()),
    ]);
    let mut out = Vec::new();
    array.encode(&mut out);
    out
}
