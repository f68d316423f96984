//! Rules seeded into an empty rules collection.

use hearth_types::models::DEFAULT_RULE_TITLES;

/// Content of the default house rules, in display order. Titles come from
/// [`DEFAULT_RULE_TITLES`].
pub const DEFAULT_RULE_CONTENT: [&str; 7] = [
    "أوقات الهدوء: من 10 مساءً إلى 6 صباحًا → صمت تام.\n\nممنوع الصراخ أو أي صوت مرتفع في أي وقت.\n\nلا دردشات جماعية أو ضحك بصوت مرتفع ليلًا.\n\nيُستثنى من ذلك من لديه امتحانات، عمل، أو يحتاج للراحة.",
    "يُسمح بالضيوف لكن بشروط:\n\nيجب المغادرة قبل بداية أوقات الهدوء.\n\nلا زيارات يومية متكررة.\n\nمن دعا الضيف يكون مسؤولًا عن أي إزعاج أو مشكلة يسببها.",
    "الأدوات والأواني تُحفظ دائمًا تحت الحوض.\n\nالتوابل (ملح، إلخ) تبقى فوق ليستفيد منها الجميع (إن وافق صاحبها).\n\nيجب تنظيف كل شيء فور الاستخدام.\n\nإذا تُركت أدوات متّسخة → لأي شخص الحق في رميها في الشرفة.\n\nلكل شخص كيس قمامة خاص به (إلا إذا اتفق اثنان على المشاركة).\n\nكل شخص يرمي قمامته بنفسه.",
    "إذا لم تُصلح → المساحة الصغيرة تُقسم بالتساوي.\n\nإذا ملأها شخص بأغراضه → للآخرين الحق في ترك طعامهم بالخارج.",
    "امسح الماء عن الأرض بعد الاستحمام أو الاستخدام.\n\nيجب إبقاء النافذة مفتوحة دائمًا.\n\nممنوع ترك الصابون أو الشامبو بالداخل (المكان ضيق).\n\nعلى الجميع استخدام معطّر أو منظّف بين فترة وأخرى لرائحة أفضل.\n\nيجب أن يبقى كرسي المرحاض وخرطوم المياه نظيفين دائمًا.\n\n**الأهم: ❌ ممنوع الاستمناء داخل الحمام.**",
    "كل شخص ينظف غرفته.\n\nإذا خرجت رائحة كريهة للممر → يجب تنظيفها فورًا.\n\nالأشياء التي تُشترى معًا = استعمالها متاح للجميع.\n\nالاستخدام يكون عادلًا وحسب الحاجة فقط.\n\nلا يُستهلك كل المنتج مرة واحدة.",
    "يجب الطرق قبل دخول أي غرفة.\n\nممنوع أخذ أو استعارة أي شيء دون إذن.\n\nإذا حدثت مشكلة → تواصل مباشرة معي أو أرسل رسالة.",
];

/// `(title, content, order)` for each default rule.
pub fn default_rules() -> impl Iterator<Item = (&'static str, &'static str, i64)> {
    DEFAULT_RULE_TITLES
        .iter()
        .zip(DEFAULT_RULE_CONTENT.iter())
        .enumerate()
        .map(|(i, (title, content))| (*title, *content, i as i64 + 1))
}
