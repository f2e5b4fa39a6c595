//! Internal util functions shared between dialout crates.

pub type IResult<I, O> = nom::IResult<I, O, nom::error::VerboseError<I>>;

pub fn identity<E>() -> impl Fn(&str) -> nom::IResult<&str, &str, E> {
    move |i| Ok(("", i))
}
