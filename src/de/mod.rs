//! Deserializes plugin configuration structs straight from a config block.
//!
//! Keys map to struct fields; repeated keys and multi-valued options map to sequences; child
//! blocks map to nested structs; a string value maps to a unit enum variant; absent keys leave
//! `Option` fields as `None`. An option written without values deserializes as `true`.

mod errors;
mod level;
pub use self::errors::*;

use crate::config::{ConfigItem, ConfigValue};
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{
    self, Deserialize, DeserializeSeed, Deserializer as _, MapAccess, SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;

/// Serde documentation shadows the std's Result type which can be really confusing for Rust
/// newcomers, so we compromise by creating an alias but prefixing with "De" to make it standout.
pub type DeResult<T> = Result<T, Error>;

/// Deserializes `T` from the statements of a block, typically `root.children` or the children
/// of a `plugin` block.
///
/// ```
/// use ncollectd_core::config::parse_str;
/// use ncollectd_core::de::from_config;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Settings {
///     interval: f64,
///     hosts: Vec<String>,
/// }
///
/// let root = parse_str("interval 10\nhosts a b\n", None).unwrap();
/// let settings: Settings = from_config(&root.children).unwrap();
/// assert_eq!(settings.interval, 10.0);
/// assert_eq!(settings.hosts, vec!["a", "b"]);
/// ```
pub fn from_config<'a, T>(items: &'a [ConfigItem]) -> DeResult<T>
where
    T: Deserialize<'a>,
{
    T::deserialize(BlockDeserializer::new(items))
}

macro_rules! forward_scalars {
    ($getter:ident; $($method:ident)*) => {
        $(
            fn $method<V>(self, visitor: V) -> DeResult<V::Value>
            where
                V: Visitor<'de>,
            {
                self.$getter()?.$method(visitor)
            }
        )*
    };
}

macro_rules! deserialize_integer {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V>(self, visitor: V) -> DeResult<V::Value>
        where
            V: Visitor<'de>,
        {
            let n = self.number()?;
            if n.fract() != 0.0 || n < <$ty>::MIN as f64 || n > <$ty>::MAX as f64 {
                return Err(Error(DeError::NumberOutOfRange(n)));
            }
            visitor.$visit(n as $ty)
        }
    };
}

/// The statements of one block, grouped by key in order of first appearance.
struct BlockDeserializer<'de> {
    groups: Vec<(&'de str, Vec<&'de ConfigItem>)>,
}

impl<'de> BlockDeserializer<'de> {
    fn new(items: &'de [ConfigItem]) -> Self {
        let mut groups: Vec<(&'de str, Vec<&'de ConfigItem>)> = Vec::new();
        for item in items {
            match groups.iter_mut().find(|(key, _)| *key == item.key) {
                Some(group) => group.1.push(item),
                None => groups.push((&item.key, vec![item])),
            }
        }
        BlockDeserializer { groups }
    }
}

impl<'de> de::Deserializer<'de> for BlockDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_map(BlockAccess {
            groups: self.groups.into_iter(),
            value: None,
        })
    }

    fn deserialize_option<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct BlockAccess<'de> {
    groups: std::vec::IntoIter<(&'de str, Vec<&'de ConfigItem>)>,
    value: Option<(&'de str, Vec<&'de ConfigItem>)>,
}

impl<'de> MapAccess<'de> for BlockAccess<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> DeResult<Option<K::Value>>
    where
        K: DeserializeSeed<'de>,
    {
        match self.groups.next() {
            Some((key, items)) => {
                self.value = Some((key, items));
                seed.deserialize(BorrowedStrDeserializer::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> DeResult<V::Value>
    where
        V: DeserializeSeed<'de>,
    {
        let (key, items) = self
            .value
            .take()
            .ok_or_else(|| <Error as de::Error>::custom("value requested before key"))?;
        let line = items.first().map(|i| i.lineno).unwrap_or(0);
        seed.deserialize(ItemsDeserializer { items })
            .map_err(|e| e.in_field(key, line))
    }
}

/// Every statement that shares one key
struct ItemsDeserializer<'de> {
    items: Vec<&'de ConfigItem>,
}

impl<'de> ItemsDeserializer<'de> {
    fn single(&self) -> DeResult<ItemDeserializer<'de>> {
        match self.items.as_slice() {
            [item] => Ok(ItemDeserializer(*item)),
            _ => Err(Error(DeError::ExpectSingleValue)),
        }
    }
}

impl<'de> de::Deserializer<'de> for ItemsDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.items.len() == 1 {
            self.single()?.deserialize_any(visitor)
        } else {
            self.deserialize_seq(visitor)
        }
    }

    fn deserialize_seq<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        let values_only = self.items.len() == 1 && self.items[0].children.is_empty();
        if values_only {
            self.single()?.deserialize_seq(visitor)
        } else {
            visitor.visit_seq(ItemSeq {
                iter: self.items.into_iter(),
            })
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.single()?.deserialize_struct(name, fields, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.single()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_scalars! {
        single;
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_f32
        deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_identifier deserialize_map
    }

    forward_to_deserialize_any! {
        i128 u128 bytes byte_buf unit unit_struct tuple tuple_struct
    }
}

struct ItemSeq<'de> {
    iter: std::vec::IntoIter<&'de ConfigItem>,
}

impl<'de> SeqAccess<'de> for ItemSeq<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> DeResult<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(item) => seed.deserialize(ItemDeserializer(item)).map(Some),
            None => Ok(None),
        }
    }
}

/// One statement: its values, or its child block when deserialized as a struct
struct ItemDeserializer<'de>(&'de ConfigItem);

impl<'de> ItemDeserializer<'de> {
    fn value(&self) -> DeResult<ValueDeserializer<'de>> {
        let item: &'de ConfigItem = self.0;
        match item.values.as_slice() {
            [value] => Ok(ValueDeserializer(value)),
            _ => Err(Error(DeError::ExpectSingleValue)),
        }
    }

    fn block(&self) -> BlockDeserializer<'de> {
        BlockDeserializer::new(&self.0.children)
    }
}

impl<'de> de::Deserializer<'de> for ItemDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if !self.0.children.is_empty() {
            return self.block().deserialize_any(visitor);
        }
        match self.0.values.len() {
            0 => visitor.visit_bool(true),
            1 => self.value()?.deserialize_any(visitor),
            _ => self.deserialize_seq(visitor),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        if self.0.values.is_empty() && self.0.children.is_empty() {
            visitor.visit_bool(true)
        } else {
            self.value()?.deserialize_bool(visitor)
        }
    }

    fn deserialize_seq<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_seq(ValueSeq {
            iter: self.0.values.iter(),
        })
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.block().deserialize_any(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.block().deserialize_any(visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.value()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_scalars! {
        value;
        deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64 deserialize_f32
        deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_identifier
    }

    forward_to_deserialize_any! {
        i128 u128 bytes byte_buf unit unit_struct tuple tuple_struct
    }
}

struct ValueSeq<'de> {
    iter: std::slice::Iter<'de, ConfigValue>,
}

impl<'de> SeqAccess<'de> for ValueSeq<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> DeResult<Option<T::Value>>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct ValueDeserializer<'de>(&'de ConfigValue);

impl<'de> ValueDeserializer<'de> {
    fn number(&self) -> DeResult<f64> {
        match *self.0 {
            ConfigValue::Number(n) => Ok(n),
            _ => Err(Error(DeError::ExpectNumber)),
        }
    }

    fn string(&self) -> DeResult<&'de str> {
        let value: &'de ConfigValue = self.0;
        match *value {
            ConfigValue::String(ref s) | ConfigValue::Regex(ref s) => Ok(s),
            _ => Err(Error(DeError::ExpectString)),
        }
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        match *self.0 {
            ConfigValue::String(ref s) | ConfigValue::Regex(ref s) => visitor.visit_borrowed_str(s),
            ConfigValue::Number(n) => visitor.visit_f64(n),
            ConfigValue::Boolean(b) => visitor.visit_bool(b),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        match *self.0 {
            ConfigValue::Boolean(b) => visitor.visit_bool(b),
            _ => Err(Error(DeError::ExpectBoolean)),
        }
    }

    deserialize_integer!(deserialize_i8, visit_i8, i8);
    deserialize_integer!(deserialize_i16, visit_i16, i16);
    deserialize_integer!(deserialize_i32, visit_i32, i32);
    deserialize_integer!(deserialize_i64, visit_i64, i64);
    deserialize_integer!(deserialize_u8, visit_u8, u8);
    deserialize_integer!(deserialize_u16, visit_u16, u16);
    deserialize_integer!(deserialize_u32, visit_u32, u32);
    deserialize_integer!(deserialize_u64, visit_u64, u64);

    fn deserialize_f32<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f32(self.number()? as f32)
    }

    fn deserialize_f64<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_f64(self.number()?)
    }

    fn deserialize_char<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        let s = self.string()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(Error(DeError::ExpectChar(String::from(s)))),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_borrowed_str(self.string()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_string(String::from(self.string()?))
    }

    fn deserialize_identifier<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_newtype_struct<V>(self, _name: &str, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    /// Unit variants are named by a string value.
    fn deserialize_enum<V>(
        self,
        _name: &str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_enum(BorrowedStrDeserializer::new(self.string()?))
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> DeResult<V::Value>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        i128 u128 bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct
    }
}
