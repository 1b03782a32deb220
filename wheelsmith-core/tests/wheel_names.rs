use proptest::prelude::*;

use wheelsmith_core::wheel::WheelName;

#[test]
fn repaired_name_differs_only_in_platform() {
    let host = WheelName::parse("ext-1.0-cp35-cp35m-linux_x86_64.whl").expect("parse");
    let repaired = WheelName::parse("ext-1.0-cp35-cp35m-manylinux1_x86_64.whl").expect("parse");

    assert_eq!(host.interpreter_tag(), repaired.interpreter_tag());
    assert_ne!(host.platform_tag, repaired.platform_tag);
    assert!(!host.is_portable());
    assert!(repaired.is_portable());
}

#[test]
fn pure_python_wheels_are_portable() {
    let name = WheelName::parse("helper-2.0-py2.py3-none-any.whl").expect("parse");
    assert!(name.is_portable());
    assert_eq!(name.python_tag, "py2.py3");
}

proptest! {
    #[test]
    fn display_reproduces_the_file_name(
        dist in "[a-z][a-z0-9_]{0,10}",
        version in "[0-9]{1,2}\\.[0-9]{1,2}(\\.[0-9]{1,2})?",
        build in proptest::option::of("[0-9]{1,3}"),
        py in "cp[23][0-9]",
        plat in "(linux|manylinux1|manylinux2010)_(x86_64|i686)",
    ) {
        let file = match &build {
            Some(b) => format!("{dist}-{version}-{b}-{py}-{py}m-{plat}.whl"),
            None => format!("{dist}-{version}-{py}-{py}m-{plat}.whl"),
        };

        let parsed = WheelName::parse(&file).expect("parse generated name");

        prop_assert_eq!(parsed.is_portable(), plat.starts_with("manylinux"));
        prop_assert_eq!(parsed.to_string(), file);
        prop_assert_eq!(parsed.build, build);
    }
}
