// src/config/defaults.rs - Built-in rule table written to a fresh config file

use std::collections::BTreeMap;

/// Look-alike character classes for every Cyrillic letter used in pattern templates
pub fn alphabet() -> BTreeMap<String, String> {
    [
        ("а", "[a4а@αᴀ🅐ᗩ₳𝙰]"),
        ("б", "[6бҕb６]"),
        ("в", "[вvɓbw]"),
        ("г", "[гgr]"),
        ("д", "[d∂д]"),
        ("е", "[e℮ᴇ3еiи]"),
        ("ж", "[жҗ]"),
        ("з", "[3зz]"),
        ("и", "[iи1йыu]"),
        ("й", "[iи1йыu]"),
        ("к", "[кҡkxх]"),
        ("л", "[l1л]"),
        ("м", "[mмʍ]"),
        ("н", "[nhн]"),
        ("о", "[o0оọσõｏ🅞Øᴏ𝐎]"),
        ("п", "[пnpρ]"),
        ("р", "[pᴩrрρ]"),
        ("с", "[сcċцs]"),
        ("т", "[тt𝗧τm]"),
        ("у", "[yуẏuʏ]"),
        ("ф", "[фf]"),
        ("х", "[xх]"),
        ("ц", "[cц]"),
        ("ч", "[hч4]"),
        ("ш", "[ш]"),
        ("щ", "[щ]"),
        ("ь", "[bьъ]"),
        ("ы", "[iи1йыu]"),
        ("ъ", "[bъь]"),
        ("э", "[e3еiи]"),
        ("ю", "[ю]"),
        ("я", "[я]"),
    ]
    .into_iter()
    .map(|(letter, class)| (letter.to_string(), class.to_string()))
    .collect()
}

pub fn curse_patterns() -> Vec<String> {
    to_strings(&[
        "(?:без|бес|в|во|воз|вос|возо|вз|вс|вы|до|за|из|ис|изо|на|наи|недо|над|надо|не|низ|нис|низо|о|об|обо|обез|обес|от|ото|па|пра|по|под|подо|пере|пре|пред|предо|при|про|раз|рас|разо|со|су|через|черес|чрез|а|ана|анти|архи|гипер|гипо|де|дез|дис|ин|интер|инфра|квази|кило|контр|макро|микро|мега|мата|мульти|орто|пан|пара|пост|прото|ре|ъ|е|суб|супер|транс|ультра|зкстра|экс|у| |^)[ъь]?(?:[pп][иёе][zзsсc]{д}|[eе][лl]{д}|[еёeiи][бb])",
        "{х}{у}[йиеяюil]",
        "(?:{п}{е}{д}|{п}{и}{д})(?:{о}|{а}|{е}){р}",
        "(?:{б}|{п})ля(?:{т}|{д})(?:ов|ь|и|ск|з|ок)",
        "{п}(?:{е}|{и}){н}{д}{о}(?:{с}|{з})",
        "{с}+[cц]?{у}(?:к|{ч})",
        "(?:{к}{а}{к}|{к}{о}{к})[ло](?:[аоуыля]|лы)",
        "(?:{м}{о}[cц][kк]|{м}{а}[cц][kк]){а}[l1л]",
        "{п}(?:{и}|{е}){з}{д}",
    ])
}

pub fn spam_substrings() -> Vec<String> {
    to_strings(&[
        "@all", "@online", "@все", "bit.do", "bit.ly", "bitly.com", "cashback", "clck.ru", "click", "cutt",
        "decordar.ru", "gclnk.com", "goo.su", "guest.link", "ify.ac", "lnnk", "ls.gd", "nyшkuнc", "nyшkuнс",
        "ok.me", "page.link", "rebrandly", "shorturl.cool", "shrt-l.ink", "t.me", "th.link", "tiktok", "tinyurl",
        "u.to", "vk.cc", "vk.me", "xxxsports.ru", "yurist-forum", "пyшкинc", "пушкинс", "belea.link",
        "tumblr.com", "telegra.ph",
    ])
}

pub fn curse_substrings() -> Vec<String> {
    to_strings(&[
        "калмунисты", "кацап", "коммуняки", "конченный", "конченый", "коцап", "кремлебот", "монолитовцы",
        "рашка", "русн", "украм", "укронацисты", "укры", "фашист", "чмо", "залуп", "нацист", "лярв", "муд",
        "пенис", "бля",
    ])
}

pub fn suspicious_patterns() -> Vec<String> {
    to_strings(&[
        "{а}{к}{ц}{и}",
        "{м}{а}{р}{к}{е}{т}",
        "{к}{у}{п}{о}{н}",
        "{п}{р}{и}{з}",
        "{с}{к}{и}{д}{к}",
        "{и}{н}{с}{т}(?:{а}|{о}|{у}|{е}|{и})",
        "{р}{у}{б}{л}",
        "{д}{о}{л}+{а}{р}",
        "{г}{р}{н}",
        "{з}{а}{р}(?:{а}|{о}){б}{о}{т}",
        "{в}h?(?:{а}|{о})(?:[cц]|ts|тс){а}{п}+",
        "{а}{в}{и}{т}{о}",
        "{т}{е}{л}{е}{г}",
        "{в}{о}{д}{и}{т}{е}{л}",
        "{в}{о}{з}{н}{а}{г}{р}",
    ])
}

pub fn suspicious_substrings() -> Vec<String> {
    to_strings(&[
        "аккаунт", "аренд", "бесплатн", "ваканс", "удален", "личн", "выплат", "гривен", "гривн", "доставка",
        "доход", "евро", "заказ", "интернет", "кешбек", "клиент", "куплю", "курьер", "кэшбек", "кэшбэк",
        "менеджер", "оплата", "партнер", "пиши", "подписывайтесь", "подпишись", "подпишитесь", "подработ",
        "подробности", "покупк", "продам", "регистратор", "розыгрыш", "самокат", "скупаю", "скидк",
        "слабонерв", "телефон", "халяв", "ценам", "мелстрой", "сертификат", "хомячки", "топовый", "маркет",
        "лохотрон", "купон", "канцтовар", "ивент", "эльдорад", "промик", "comedy", "тнт", "деньг", "бонус",
        "wb", "wildberr", "вайлбер", "вайлдбер", "валбер", "валдбер", "валбир", "промокод", "конкурс",
        "допомогт", "кошт", "картк", "доньк", "операці", "органів", "допомог", "интим", "онлифанс", "котик",
        "антибіот", "пассив", "гибдд", "@", "калым", "амбиц", "₽", "$", "€", "грн", "дoхiд",
    ])
}

pub fn whitelist_substrings() -> Vec<String> {
    to_strings(&[
        "блямб", "блях", "бляш", "влюб", "греб", "дуб", "заглуб", "истреб", "канальн", "колеб", "веб", "обляп",
        "оглоб", "перпендик", "озлоб", "оскорб", "пособ", "потреб", "радиоактив", "раздроб", "слаб", "углуб",
        "укрыт", "виробл", "наибол", "сухогруз", "розробл", "чмок", "вопрос", "призм", "полторашк", "себ",
        "себя", "нибудь", "ибо", "корабл", "каприз", "сухп", "засуха", "ибк", "вибр", "реакц", "реакт",
        "призв", "призн", "мудр", "рубл", "плох", "атракц", "аттракц", "судоход", "подоход", "сиби",
    ])
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
