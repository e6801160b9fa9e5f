//! Declarative macros shared by the database layer.
//!
//! `impl_db_dispatch!` expands one match arm per backend so that pool,
//! transaction and connection enums can be handled without hand-writing the
//! same three-way match each time. `params!` builds a [`Params`] map inline.
//!
//! [`Params`]: crate::models::Params

/// Macro for generating backend dispatch match arms.
///
/// The enum defaults to `DbPool`; pass another backend enum explicitly.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
///
/// impl_db_dispatch!(DbTransaction: tx, {
///     MySql(t) => t.commit().await,
///     Postgres(t) => t.commit().await,
///     SQLite(t) => t.commit().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($kind:ident : $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::$kind::$variant($p) => $body,
            )+
        }
    };
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        $crate::impl_db_dispatch!(DbPool: $pool, { $($variant($p) => $body),+ })
    };
}

/// Build a [`Params`](crate::models::Params) map from `name => value` pairs.
///
/// Values go through `QueryParam::from`, so plain Rust literals, `String`s
/// and `Option`s work directly.
///
/// ```
/// use sqldb::{params, QueryParam};
///
/// let p = params! { "id" => 7, "name" => "alice", "note" => None::<String> };
/// assert_eq!(p.get("id"), Some(&QueryParam::Int(7)));
/// assert_eq!(p.get("note"), Some(&QueryParam::Null));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::models::Params::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::models::Params::new();
        $(
            params.insert(
                ::std::string::String::from($name),
                $crate::models::QueryParam::from($value),
            );
        )+
        params
    }};
}

pub use impl_db_dispatch;

#[cfg(test)]
mod tests {
    use crate::models::{Params, QueryParam};

    #[test]
    fn test_params_macro_empty() {
        let p: Params = params! {};
        assert!(p.is_empty());
    }

    #[test]
    fn test_params_macro_converts_values() {
        let name = String::from("bob");
        let p = params! {
            "id" => 1,
            "name" => name,
            "ratio" => 0.5,
            "flag" => false,
        };
        assert_eq!(p.len(), 4);
        assert_eq!(p.get("id"), Some(&QueryParam::Int(1)));
        assert_eq!(p.get("name"), Some(&QueryParam::String("bob".to_string())));
        assert_eq!(p.get("ratio"), Some(&QueryParam::Float(0.5)));
        assert_eq!(p.get("flag"), Some(&QueryParam::Bool(false)));
    }

    #[test]
    fn test_params_macro_last_value_wins() {
        let p = params! { "v" => 1, "v" => 2 };
        assert_eq!(p.get("v"), Some(&QueryParam::Int(2)));
    }
}
