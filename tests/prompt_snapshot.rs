use modlang_translator::glossary::Glossary;
use modlang_translator::languages::LocaleNames;
use modlang_translator::settings;
use modlang_translator::translations::{TranslateOptions, render_system_prompt};

#[test]
fn system_prompt_snapshot() {
    let settings = settings::Settings::default();
    let names = LocaleNames::load().unwrap();
    let mut glossary = Glossary::default();
    glossary.insert("Creeper", "クリーパー");
    let options = TranslateOptions {
        source_lang: "en_us".to_string(),
        target_lang: "ja_jp".to_string(),
        context: settings.context,
    };
    let prompt = render_system_prompt(&options, &names, &glossary).unwrap();
    insta::assert_snapshot!(prompt.trim_end(), @r#"
    You are a professional translator for game mod localization files.
    Translate the JSON values from English to Japanese.

    # Output Format Rules
    1. Output strictly a FLAT JSON object: { "original_key": "translated_value" }.
    2. Do NOT use a list or array.
    3. Do NOT wrap the result in keys like "translations".
    4. Return every key you were given, unchanged.

    # Translation Rules
    1. Preserve format specifiers and placeholders exactly (%s, %d, %.1f, %1$s, {0}, §a).
    2. Never translate keys; translate values only.
    3. Always use the glossary terms below when the source term appears.
    4. Context: Minecraft Gaming.

    # Glossary
    {"Creeper":"クリーパー"}
    "#);
}
