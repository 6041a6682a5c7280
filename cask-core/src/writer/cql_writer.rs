use crate::{
    ColumnType, CounterData, DeleteData, Delta, Operator, Predicate, ReadData, TableRef, Value,
    WriteData, separated_by,
    writer::{Bind, BindShape, Context, Fragment},
};

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// Printer turning query data into CQL text plus the ordered list of bound values.
///
/// Every value is written as a `?` marker and recorded in [`Context::binds`], the text never
/// contains literals coming from the caller.
pub trait CqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn CqlWriter;

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(context, out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_table_ref(&self, context: &mut Context, out: &mut String, value: &TableRef) {
        if !value.keyspace.is_empty() {
            self.write_identifier_quoted(context, out, &value.keyspace);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, &value.name);
    }

    fn write_bind(
        &self,
        context: &mut Context,
        out: &mut String,
        column: &str,
        shape: BindShape,
        value: &Value,
    ) {
        out.push('?');
        let key = context.fragment == Fragment::CqlWhereKey;
        context.binds.push(Bind {
            column: column.into(),
            shape,
            value: value.clone(),
            key,
        });
    }

    fn write_predicate(&self, context: &mut Context, out: &mut String, value: &Predicate) {
        self.write_identifier_quoted(context, out, &value.column);
        out.push(' ');
        out.push_str(value.op.as_str());
        out.push(' ');
        let shape = match value.op {
            Operator::In => BindShape::ListOf,
            Operator::Contains => BindShape::ElementOf,
            Operator::ContainsKey => BindShape::KeyOf,
            _ => BindShape::Column,
        };
        self.write_bind(context, out, &value.column, shape, &value.value);
    }

    fn write_where(
        &self,
        context: &mut Context,
        out: &mut String,
        keys: &[(String, Value)],
        predicates: &[Predicate],
    ) {
        if keys.is_empty() && predicates.is_empty() {
            return;
        }
        out.push_str(" WHERE ");
        if !keys.is_empty() {
            let mut context = context.switch_fragment(Fragment::CqlWhereKey);
            separated_by(
                out,
                keys,
                |out, (column, value)| {
                    self.write_identifier_quoted(&mut context, out, column);
                    out.push_str(" = ");
                    self.write_bind(&mut context, out, column, BindShape::Column, value);
                },
                " AND ",
            );
        } else {
            let mut context = context.switch_fragment(Fragment::CqlWhere);
            separated_by(
                out,
                predicates,
                |out, v| self.write_predicate(&mut context, out, v),
                " AND ",
            );
        }
    }

    fn write_conditions(&self, context: &mut Context, out: &mut String, only_if: &[Predicate]) {
        if only_if.is_empty() {
            return;
        }
        let mut context = context.switch_fragment(Fragment::CqlCondition);
        out.push_str(" IF ");
        separated_by(
            out,
            only_if,
            |out, v| self.write_predicate(&mut context, out, v),
            " AND ",
        );
    }

    /// `USING TTL ?`, the time to live is bound like any other value.
    fn write_using(&self, context: &mut Context, out: &mut String, ttl: Option<u32>) {
        let Some(ttl) = ttl else {
            return;
        };
        let mut context = context.switch_fragment(Fragment::CqlUsing);
        out.push_str(" USING TTL ");
        self.write_bind(
            &mut context,
            out,
            "[ttl]",
            BindShape::Fixed(ColumnType::Int),
            &Value::Int(Some(ttl.min(i32::MAX as u32) as i32)),
        );
    }

    /// `INSERT` or `UPDATE` depending on the data.
    fn write_write(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &TableRef,
        data: &WriteData,
        ttl: Option<u32>,
    ) {
        if data.is_insert() {
            self.write_insert(context, out, table, data, ttl);
        } else {
            self.write_update(context, out, table, data, ttl);
        }
    }

    fn write_insert(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &TableRef,
        data: &WriteData,
        ttl: Option<u32>,
    ) {
        let null = Value::Null;
        let columns = data
            .keys
            .iter()
            .map(|(k, v)| (k, v))
            .chain(
                data.values
                    .iter()
                    .map(|(k, v)| (k, v.as_ref().unwrap_or(&null))),
            )
            .collect::<Vec<_>>();
        {
            let mut context = context.switch_fragment(Fragment::CqlInsertInto);
            out.push_str("INSERT INTO ");
            self.write_table_ref(&mut context, out, table);
            out.push_str(" (");
            separated_by(
                out,
                &columns,
                |out, (k, _)| self.write_identifier_quoted(&mut context, out, k),
                ", ",
            );
        }
        {
            let mut context = context.switch_fragment(Fragment::CqlInsertIntoValues);
            out.push_str(") VALUES (");
            separated_by(
                out,
                &columns,
                |out, (k, v)| self.write_bind(&mut context, out, k, BindShape::Column, v),
                ", ",
            );
            out.push(')');
        }
        if data.if_not_exists {
            out.push_str(" IF NOT EXISTS");
        }
        self.write_using(context, out, ttl);
    }

    fn write_update(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &TableRef,
        data: &WriteData,
        ttl: Option<u32>,
    ) {
        {
            let mut context = context.switch_fragment(Fragment::CqlUpdate);
            out.push_str("UPDATE ");
            self.write_table_ref(&mut context, out, table);
        }
        self.write_using(context, out, ttl);
        {
            let mut context = context.switch_fragment(Fragment::CqlUpdateSet);
            out.push_str(" SET ");
            let null = Value::Null;
            let mut first = true;
            for (column, value) in &data.values {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                self.write_identifier_quoted(&mut context, out, column);
                out.push_str(" = ");
                let value = value.as_ref().unwrap_or(&null);
                self.write_bind(&mut context, out, column, BindShape::Column, value);
            }
            for (delta, column, value) in data.deltas() {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                self.write_delta(&mut context, out, delta, column, value);
            }
        }
        self.write_where(context, out, &data.keys, &data.predicates);
        self.write_conditions(context, out, &data.only_if);
    }

    fn write_delta(
        &self,
        context: &mut Context,
        out: &mut String,
        delta: Delta,
        column: &str,
        value: &Value,
    ) {
        self.write_identifier_quoted(context, out, column);
        out.push_str(" = ");
        let shape = if delta == Delta::MapRemove {
            BindShape::KeySetOf
        } else {
            BindShape::Column
        };
        if delta == Delta::ListPrepend {
            self.write_bind(context, out, column, shape, value);
            out.push_str(" + ");
            self.write_identifier_quoted(context, out, column);
            return;
        }
        self.write_identifier_quoted(context, out, column);
        out.push_str(match delta {
            Delta::SetAdd | Delta::ListAppend | Delta::MapPut => " + ",
            _ => " - ",
        });
        self.write_bind(context, out, column, shape, value);
    }

    fn write_delete(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &TableRef,
        data: &DeleteData,
    ) {
        {
            let mut context = context.switch_fragment(Fragment::CqlDelete);
            out.push_str("DELETE ");
            separated_by(
                out,
                &data.columns,
                |out, v| self.write_identifier_quoted(&mut context, out, v),
                ", ",
            );
            if !data.columns.is_empty() {
                out.push(' ');
            }
            out.push_str("FROM ");
            self.write_table_ref(&mut context, out, table);
        }
        self.write_where(context, out, &data.keys, &data.predicates);
        if data.if_exists {
            out.push_str(" IF EXISTS");
        }
        self.write_conditions(context, out, &data.only_if);
    }

    fn write_select(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &TableRef,
        data: &ReadData,
    ) {
        {
            let mut context = context.switch_fragment(Fragment::CqlSelect);
            out.push_str("SELECT ");
            if data.distinct {
                out.push_str("DISTINCT ");
            }
            match data.projection() {
                None => out.push('*'),
                Some(columns) => separated_by(
                    out,
                    columns,
                    |out, (column, metadata)| {
                        self.write_identifier_quoted(&mut context, out, column);
                        if metadata {
                            out.push_str(", WRITETIME(");
                            self.write_identifier_quoted(&mut context, out, column);
                            out.push_str("), TTL(");
                            self.write_identifier_quoted(&mut context, out, column);
                            out.push(')');
                        }
                    },
                    ", ",
                ),
            }
            out.push_str(" FROM ");
            self.write_table_ref(&mut context, out, table);
        }
        self.write_where(context, out, &data.keys, &data.predicates);
        if let Some(limit) = data.limit {
            out.push_str(" LIMIT ");
            write_integer!(out, limit);
        }
        if data.allow_filtering {
            out.push_str(" ALLOW FILTERING");
        }
    }

    fn write_counter_update(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &TableRef,
        data: &CounterData,
    ) {
        {
            let mut context = context.switch_fragment(Fragment::CqlUpdate);
            out.push_str("UPDATE ");
            self.write_table_ref(&mut context, out, table);
        }
        {
            let mut context = context.switch_fragment(Fragment::CqlUpdateSet);
            out.push_str(" SET ");
            separated_by(
                out,
                &data.deltas,
                |out, (column, delta)| {
                    self.write_identifier_quoted(&mut context, out, column);
                    out.push_str(" = ");
                    self.write_identifier_quoted(&mut context, out, column);
                    out.push_str(" + ");
                    self.write_bind(
                        &mut context,
                        out,
                        column,
                        BindShape::Column,
                        &Value::Counter(Some(*delta)),
                    );
                },
                ", ",
            );
        }
        self.write_where(context, out, &data.keys, &[]);
    }
}

/// Plain CQL, what every store speaking the native protocol accepts.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericCqlWriter;

impl GenericCqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}

impl CqlWriter for GenericCqlWriter {
    fn as_dyn(&self) -> &dyn CqlWriter {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Predicate, ReadData, WriteData};
    use indoc::indoc;

    const TABLE: TableRef = TableRef::new("shop", "orders");

    fn write(data: &WriteData, ttl: Option<u32>) -> (String, Context) {
        let mut context = Context::default();
        let mut out = String::new();
        GenericCqlWriter.write_write(&mut context, &mut out, &TABLE, data, ttl);
        (out, context)
    }

    #[test]
    fn insert() {
        let data = WriteData::new()
            .key("id", 1)
            .set("name", "book")
            .unset("note")
            .if_not_exists();
        let (cql, context) = write(&data, Some(60));
        assert_eq!(
            cql,
            indoc! {r#"
                INSERT INTO "shop"."orders" ("id", "name", "note") VALUES (?, ?, ?) IF NOT EXISTS USING TTL ?
            "#}
            .trim()
        );
        let columns: Vec<_> = context.binds.iter().map(|v| v.column.as_str()).collect();
        assert_eq!(columns, ["id", "name", "note", "[ttl]"]);
        assert_eq!(context.binds[2].value, Value::Null);
        assert_eq!(context.fragment, Fragment::None);
    }

    #[test]
    fn update_with_deltas() {
        let data = WriteData::new()
            .key("id", 1)
            .set("name", "book")
            .add_to_set("tags", vec!["new".to_string()])
            .prepend_to_list("history", vec![3])
            .remove_from_map("attributes", vec!["color".to_string()])
            .only_if(Predicate::eq("name", "old"));
        let (cql, context) = write(&data, None);
        assert_eq!(
            cql,
            indoc! {r#"
                UPDATE "shop"."orders" SET "name" = ?, "tags" = "tags" + ?, "history" = ? + "history", "attributes" = "attributes" - ? WHERE "id" = ? IF "name" = ?
            "#}
            .trim()
        );
        let shapes: Vec<_> = context.binds.iter().map(|v| (&v.shape, v.key)).collect();
        assert_eq!(
            shapes,
            [
                (&BindShape::Column, false),
                (&BindShape::Column, false),
                (&BindShape::Column, false),
                (&BindShape::KeySetOf, false),
                (&BindShape::Column, true),
                (&BindShape::Column, false),
            ]
        );
    }

    #[test]
    fn update_where() {
        let data = WriteData::new()
            .filter(Predicate::is_in("id", [1, 2]))
            .set("flag", true);
        let (cql, context) = write(&data, Some(10));
        assert_eq!(
            cql,
            r#"UPDATE "shop"."orders" USING TTL ? SET "flag" = ? WHERE "id" IN ?"#
        );
        assert_eq!(context.binds[2].shape, BindShape::ListOf);
        assert!(!context.binds[2].key);
    }

    #[test]
    fn select() {
        let data = ReadData::new()
            .key("id", 1)
            .column("name")
            .column_with_metadata("price")
            .limit(10);
        let mut context = Context::default();
        let mut out = String::new();
        GenericCqlWriter.write_select(&mut context, &mut out, &TABLE, &data);
        assert_eq!(
            out,
            indoc! {r#"
                SELECT "name", "price", WRITETIME("price"), TTL("price"), "id" FROM "shop"."orders" WHERE "id" = ? LIMIT 10
            "#}
            .trim()
        );
        assert!(context.binds[0].key);

        let data = ReadData::new()
            .filter(Predicate::contains("tags", "a"))
            .distinct()
            .allow_filtering();
        let mut context = Context::default();
        let mut out = String::new();
        GenericCqlWriter.write_select(&mut context, &mut out, &TABLE, &data);
        assert_eq!(
            out,
            r#"SELECT DISTINCT * FROM "shop"."orders" WHERE "tags" CONTAINS ? ALLOW FILTERING"#
        );
        assert_eq!(context.binds[0].shape, BindShape::ElementOf);
    }

    #[test]
    fn delete_and_counter() {
        let data = DeleteData::new().key("id", 7).column("note").if_exists();
        let mut context = Context::default();
        let mut out = String::new();
        GenericCqlWriter.write_delete(&mut context, &mut out, &TABLE, &data);
        assert_eq!(
            out,
            r#"DELETE "note" FROM "shop"."orders" WHERE "id" = ? IF EXISTS"#
        );

        let data = CounterData::new().key("id", 7).increment("views", 2).decrement("likes", 1);
        let mut context = Context::default();
        let mut out = String::new();
        GenericCqlWriter.write_counter_update(&mut context, &mut out, &TABLE, &data);
        assert_eq!(
            out,
            r#"UPDATE "shop"."orders" SET "views" = "views" + ?, "likes" = "likes" + ? WHERE "id" = ?"#
        );
        assert_eq!(context.binds[1].value, Value::Counter(Some(-1)));
    }

    #[test]
    fn quoted_identifier() {
        let mut context = Context::default();
        let mut out = String::new();
        GenericCqlWriter.write_identifier_quoted(&mut context, &mut out, r#"we"ird"#);
        assert_eq!(out, r#""we""ird""#);
    }
}
